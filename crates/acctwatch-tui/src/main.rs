//! Terminal dashboard: runs the pollers in-process and charts the account
//! creations they find.
use std::{
    fs::File,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use acctwatch_core::{sync::Watcher, BlockHeader, LedgerEntry, ProgressSnapshot, StateHandle};
use acctwatch_rpc::WatchArgs;
use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    layout::{Constraint, Direction, Flex, Layout, Rect},
    prelude::*,
    widgets::*,
    Frame,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod chart;

use chart::{ChartCache, StackedBarChart};

const REFRESH_EVERY: Duration = Duration::from_millis(250);

#[derive(Parser, Debug, Clone)]
#[command(name = "acctwatch-tui")]
#[command(about = "Live chart of account creations per block")]
struct Args {
    #[command(flatten)]
    watch: WatchArgs,

    /// Write logs here instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug)]
struct App {
    state: StateHandle,
    rpc: String,
    snapshot: ProgressSnapshot,
    chart: ChartCache,
    selected: usize,
    popup: bool,
    last_refresh: Instant,
}

impl App {
    fn new(state: StateHandle, rpc: String) -> Self {
        let snapshot = state.snapshot();
        let mut app = Self {
            state,
            rpc,
            snapshot,
            chart: ChartCache::default(),
            selected: 0,
            popup: false,
            last_refresh: Instant::now(),
        };
        app.refresh();
        app
    }

    fn refresh(&mut self) {
        self.snapshot = self.state.snapshot();
        self.chart.update(&self.snapshot.ledger);
        if self.selected >= self.bar_count() {
            self.selected = self.bar_count().saturating_sub(1);
        }
        self.last_refresh = Instant::now();
    }

    fn bar_count(&self) -> usize {
        self.chart.layout().bars.len()
    }

    fn next_bar(&mut self) {
        let n = self.bar_count();
        if n > 0 {
            self.selected = (self.selected + 1) % n;
        }
    }

    fn previous_bar(&mut self) {
        let n = self.bar_count();
        if n > 0 {
            self.selected = if self.selected == 0 { n - 1 } else { self.selected - 1 };
        }
    }

    fn selected_entry(&self) -> Option<&LedgerEntry> {
        self.snapshot.ledger.entries.get(self.selected)
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            // the alternate screen owns stdout; keep stderr quiet
            fmt()
                .with_env_filter(EnvFilter::new("error"))
                .with_target(false)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    let provider = Arc::new(args.watch.provider()?);
    let watcher = Watcher::new(provider, args.watch.watch_config());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = watcher.spawn(shutdown_rx);
    info!(rpc = %args.watch.rpc, tasks = tasks.len(), "watcher started");

    // terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(watcher.state(), args.watch.rpc.clone());
    let res = run_app(&mut terminal, &mut app);

    // restore
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(2), tasks.join())
        .await
        .is_err()
    {
        warn!("tasks still fetching at exit");
    }
    res
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if crossterm::event::poll(Duration::from_millis(200))? {
            if let CEvent::Key(key) = event::read()? {
                if handle_key(app, key) {
                    break;
                }
            }
        }

        if app.last_refresh.elapsed() >= REFRESH_EVERY {
            app.refresh();
        }
    }
    Ok(())
}

/// Returns `true` when the app should exit.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return true,
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Right => app.next_bar(),
        KeyCode::Left => app.previous_bar(),
        KeyCode::Char('p') | KeyCode::Enter => app.popup = !app.popup,
        _ => {}
    }
    false
}

fn ui(f: &mut Frame, app: &App) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);

    let title = Paragraph::new(Line::from(vec![
        Span::styled("New accounts per block", Style::default().bold()),
        Span::raw(format!("   rpc: {}", app.rpc)),
    ]))
    .block(Block::default().borders(Borders::ALL).title("acctwatch-tui"))
    .style(Style::default().fg(Color::Green));
    f.render_widget(title, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[1]);

    let selected = (app.bar_count() > 0).then_some(app.selected);
    let chart = StackedBarChart::new(app.chart.layout())
        .selected(selected)
        .block(Block::default().borders(Borders::ALL).title("Accounts created"));
    f.render_widget(chart, body[0]);
    render_progress(f, body[1], &app.snapshot);

    let footer = Paragraph::new(vec![
        Line::from(format!(
            "Working on these gap blocks: {}",
            app.snapshot.gap_queue_len
        )),
        Line::from("q/ESC quit • ←/→ select block • p/Enter accounts • r refresh")
            .style(Style::default().fg(Color::DarkGray)),
    ])
    .block(Block::default().borders(Borders::TOP));
    f.render_widget(footer, chunks[2]);

    if app.popup {
        let popup = Block::bordered()
            .style(Style::default().bg(Color::Black).fg(Color::Yellow))
            .title("Accounts created")
            .title_style(Style::new().yellow().bold())
            .border_style(Style::new().red().bold());
        let items = match app.selected_entry() {
            None => vec!["No block selected".to_string()],
            Some(entry) => {
                let mut items = vec![
                    format!(" Block : {}", entry.block_height),
                    format!(" Hash  : {}", entry.block_hash),
                ];
                items.extend(entry.accounts.iter().map(|a| format!("  • {}", a.id)));
                items
            }
        };
        let list = List::new(items).block(popup.clone());
        let popup_area = centered_area(chunks[1], 60, 50);
        // clears out any background in the area before rendering the popup
        f.render_widget(Clear, popup_area);
        f.render_widget(popup, popup_area);
        f.render_widget(list, popup_area);
    }
}

fn block_cards(headers: &[BlockHeader]) -> Vec<ListItem<'static>> {
    headers
        .iter()
        .map(|h| {
            ListItem::new(vec![
                Line::from(format!("#{}", h.height)).bold(),
                Line::from(h.hash.clone()).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect()
}

fn render_progress(f: &mut Frame, area: Rect, snapshot: &ProgressSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Min(4),
            Constraint::Length(4),
            Constraint::Min(4),
        ])
        .split(area);

    let summary = Paragraph::new(vec![
        Line::from(format!("Max height checked: {}", snapshot.max_height_checked)),
        Line::from(snapshot.traversal_label()),
        Line::from(format!("Last checked: {}", snapshot.last_checked_label())),
    ])
    .block(Block::default().title("Progress").borders(Borders::ALL));
    f.render_widget(summary, chunks[0]);

    let recent = List::new(block_cards(&snapshot.recent_blocks))
        .block(Block::default().title("Walking back").borders(Borders::ALL));
    f.render_widget(recent, chunks[1]);

    let catch_up = Paragraph::new(snapshot.catch_up_label())
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Latest").borders(Borders::ALL));
    f.render_widget(catch_up, chunks[2]);

    let gaps = List::new(block_cards(&snapshot.gap_blocks))
        .block(Block::default().title("Gap blocks").borders(Borders::ALL));
    f.render_widget(gaps, chunks[3]);
}

/// Create a centered rect using the given percentage of the available rect
fn centered_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let [area] = vertical.areas(area);

    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = horizontal.areas(area);

    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use acctwatch_core::{seed, sync::WatchConfig, WatchState};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;

    fn app_with_mock_data() -> App {
        let state = StateHandle::new(WatchState::new(&WatchConfig::default()));
        seed::load_mock_entries(&state);
        App::new(state, "http://localhost:3030".to_string())
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn quit_keys() {
        let mut app = app_with_mock_data();
        assert!(handle_key(&mut app, key(KeyCode::Char('q'))));
        assert!(handle_key(&mut app, key(KeyCode::Esc)));
        assert!(handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
        ));
        assert!(!handle_key(&mut app, key(KeyCode::Char('c'))));
    }

    #[test]
    fn arrows_move_the_selection_and_wrap() {
        let mut app = app_with_mock_data();
        assert_eq!(app.bar_count(), 4);
        assert_eq!(app.selected, 0);
        handle_key(&mut app, key(KeyCode::Left));
        assert_eq!(app.selected, 3);
        handle_key(&mut app, key(KeyCode::Right));
        assert_eq!(app.selected, 0);
        handle_key(&mut app, key(KeyCode::Right));
        assert_eq!(app.selected_entry().unwrap().block_height, 898383);
    }

    #[test]
    fn popup_toggles() {
        let mut app = app_with_mock_data();
        handle_key(&mut app, key(KeyCode::Char('p')));
        assert!(app.popup);
        handle_key(&mut app, key(KeyCode::Enter));
        assert!(!app.popup);
    }

    #[test]
    fn refresh_picks_up_new_blocks() {
        let mut app = app_with_mock_data();
        app.state.record_if_absent(900_000, "fresh", "new.near");
        assert_eq!(app.bar_count(), 4);
        handle_key(&mut app, key(KeyCode::Char('r')));
        // six bars fit, so nothing was evicted yet
        assert_eq!(app.bar_count(), 5);
        assert_eq!(app.chart.rebuilds(), 2);

        handle_key(&mut app, key(KeyCode::Char('r')));
        assert_eq!(app.chart.rebuilds(), 2);
    }

    #[test]
    fn selection_stays_in_range_after_eviction() {
        let state = StateHandle::new(WatchState::new(&WatchConfig {
            max_blocks: 2,
            ..WatchConfig::default()
        }));
        state.record_if_absent(1, "h1", "a");
        state.record_if_absent(2, "h2", "b");
        let mut app = App::new(state, String::new());
        app.selected = 1;
        app.state.record_if_absent(3, "h3", "c");
        app.refresh();
        assert!(app.selected < app.bar_count());
    }

    #[test]
    fn dashboard_renders_progress_and_footer() {
        let mut app = app_with_mock_data();
        app.state.observe_head(1_000, 50);
        app.state.observe_head(1_003, 50);
        app.refresh();

        let text = screen(&app);
        assert!(text.contains("Max height checked: 1003"), "{text}");
        assert!(text.contains("Traversing backward: 0/1991 times"), "{text}");
        assert!(text.contains("Need to catch up to: 1001, 1002, 1003"), "{text}");
        assert!(text.contains("Working on these gap blocks: 3"), "{text}");
        assert!(text.contains("898385"), "{text}");
    }

    #[test]
    fn popup_lists_the_selected_block_accounts() {
        let mut app = app_with_mock_data();
        app.selected = 3;
        app.popup = true;
        let text = screen(&app);
        assert!(text.contains("Block : 898385"), "{text}");
        assert!(text.contains("vitalik (mock data)"), "{text}");
    }

    #[test]
    fn empty_ledger_has_no_selection() {
        let state = StateHandle::new(WatchState::new(&WatchConfig::default()));
        let mut app = App::new(state, String::new());
        handle_key(&mut app, key(KeyCode::Right));
        assert_eq!(app.selected, 0);
        assert!(app.selected_entry().is_none());
        app.popup = true;
        assert!(screen(&app).contains("No block selected"));
    }
}
