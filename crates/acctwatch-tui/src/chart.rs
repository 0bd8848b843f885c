//! Stacked bar chart of account creations per block height.
//!
//! Layout is computed from a [`LedgerSnapshot`] and cached by [`ChartCache`];
//! it is rebuilt only when the set of displayed heights or the total number
//! of accounts changes. [`StackedBarChart`] draws a cached layout cell by cell.

use acctwatch_core::LedgerSnapshot;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Widget},
};
use tracing::debug;

/// Segment fill colours, cycled by stack level.
pub const BRAND_COLORS: [Color; 3] = [
    Color::Rgb(0xf0, 0xec, 0x74),
    Color::Rgb(0xff, 0x58, 0x5d),
    Color::Rgb(0x24, 0x27, 0x2a),
];

// Text drawn on top of each brand colour.
const LABEL_COLORS: [Color; 3] = [Color::Black, Color::Black, Color::White];

const MAX_TICK_INTERVALS: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub account: String,
    pub level: usize,
}

impl Segment {
    pub fn color(&self) -> Color {
        BRAND_COLORS[self.level % BRAND_COLORS.len()]
    }

    fn label_color(&self) -> Color {
        LABEL_COLORS[self.level % LABEL_COLORS.len()]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bar {
    pub height: u64,
    pub hash: String,
    /// Bottom segment first.
    pub segments: Vec<Segment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChartLayout {
    pub key: String,
    pub total_accounts: usize,
    pub bars: Vec<Bar>,
    pub y_max: usize,
    pub ticks: Vec<usize>,
}

impl ChartLayout {
    pub fn from_snapshot(ledger: &LedgerSnapshot) -> Self {
        let bars = ledger
            .entries
            .iter()
            .map(|entry| Bar {
                height: entry.block_height,
                hash: entry.block_hash.clone(),
                segments: entry
                    .accounts
                    .iter()
                    .enumerate()
                    .map(|(level, record)| Segment {
                        account: record.id.clone(),
                        level,
                    })
                    .collect(),
            })
            .collect();
        let ticks = y_ticks(ledger.max_accounts());
        Self {
            key: ledger.display_key(),
            total_accounts: ledger.total_accounts(),
            bars,
            y_max: ticks.last().copied().unwrap_or(1),
            ticks,
        }
    }
}

/// Whole-number axis ticks from zero covering `max`, at most
/// `MAX_TICK_INTERVALS` intervals.
pub fn y_ticks(max: usize) -> Vec<usize> {
    let max = max.max(1);
    let step = max.div_ceil(MAX_TICK_INTERVALS).max(1);
    let mut ticks = vec![0];
    let mut tick = 0;
    while tick < max {
        tick += step;
        ticks.push(tick);
    }
    ticks
}

#[derive(Debug, Default)]
pub struct ChartCache {
    layout: ChartLayout,
    rebuilds: usize,
}

impl ChartCache {
    /// Returns `true` when the layout was recomputed.
    pub fn update(&mut self, ledger: &LedgerSnapshot) -> bool {
        let key = ledger.display_key();
        let total = ledger.total_accounts();
        if self.rebuilds > 0 && key == self.layout.key && total == self.layout.total_accounts {
            return false;
        }
        self.layout = ChartLayout::from_snapshot(ledger);
        self.rebuilds += 1;
        debug!(key = %self.layout.key, total, "chart layout rebuilt");
        true
    }

    pub fn layout(&self) -> &ChartLayout {
        &self.layout
    }

    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }
}

pub struct StackedBarChart<'a> {
    layout: &'a ChartLayout,
    selected: Option<usize>,
    block: Option<Block<'a>>,
}

impl<'a> StackedBarChart<'a> {
    pub fn new(layout: &'a ChartLayout) -> Self {
        Self {
            layout,
            selected: None,
            block: None,
        }
    }

    pub fn selected(mut self, index: Option<usize>) -> Self {
        self.selected = index;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

fn rows_for(value: usize, plot_height: u16, y_max: usize) -> u16 {
    let rows = (value * plot_height as usize + y_max / 2) / y_max.max(1);
    rows.min(plot_height as usize) as u16
}

fn clip(s: &str, width: u16) -> String {
    s.chars().take(width as usize).collect()
}

impl Widget for StackedBarChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = match self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.render(area, buf);
                inner
            }
            None => area,
        };
        let layout = self.layout;
        if inner.width < 8 || inner.height < 4 {
            return;
        }
        if layout.bars.is_empty() {
            buf.set_string(
                inner.x + 1,
                inner.y,
                "No account creations yet",
                Style::default().fg(Color::DarkGray),
            );
            return;
        }

        let axis_width = layout.y_max.to_string().len() as u16;
        let plot = Rect {
            x: inner.x + axis_width + 1,
            y: inner.y,
            width: inner.width.saturating_sub(axis_width + 1),
            height: inner.height - 1,
        };
        let baseline = plot.bottom();

        let axis_style = Style::default().fg(Color::DarkGray);
        for y in plot.y..baseline {
            buf.set_string(plot.x - 1, y, "│", axis_style);
        }
        for &tick in &layout.ticks {
            let y = baseline
                .saturating_sub(rows_for(tick, plot.height, layout.y_max))
                .max(plot.y);
            buf.set_string(
                inner.x,
                y,
                format!("{tick:>width$}", width = axis_width as usize),
                axis_style,
            );
        }

        let slot = plot.width / layout.bars.len() as u16;
        if slot == 0 {
            return;
        }
        let bar_width = (slot * 2 / 3).max(1);
        for (i, bar) in layout.bars.iter().enumerate() {
            let slot_x = plot.x + i as u16 * slot;
            let x = slot_x + (slot - bar_width) / 2;
            for (k, segment) in bar.segments.iter().enumerate() {
                let lo = rows_for(k, plot.height, layout.y_max);
                let hi = rows_for(k + 1, plot.height, layout.y_max);
                if hi <= lo {
                    continue;
                }
                let rect = Rect {
                    x,
                    y: baseline - hi,
                    width: bar_width,
                    height: hi - lo,
                };
                let fill = Style::default().bg(segment.color());
                buf.set_style(rect, fill);
                buf.set_string(
                    x,
                    rect.y,
                    clip(&segment.account, bar_width),
                    fill.fg(segment.label_color()),
                );
            }

            let label = clip(&bar.height.to_string(), slot);
            let label_x = slot_x + (slot - label.chars().count() as u16) / 2;
            let label_style = if self.selected == Some(i) {
                Style::default().add_modifier(Modifier::REVERSED | Modifier::BOLD)
            } else {
                Style::default()
            };
            buf.set_string(label_x, baseline, label, label_style);
        }
    }
}
