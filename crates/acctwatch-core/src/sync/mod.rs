//! # Polling tasks
//!
//! Three independent loops feed the shared [`StateHandle`]:
//!
//! - [`LatestPoller`] polls the chain head, records it, and queues any heights
//!   skipped since the last poll;
//! - [`HistoricalWalker`] walks `prev_hash` links backward from the head, up to
//!   an iteration cap;
//! - [`GapWalker`] drains the queue of skipped heights one per tick.
//!
//! Each loop runs as its own tokio task and stops when the shutdown channel
//! flips to `true` or its sender is dropped. A tick that is already fetching
//! runs to completion first. A failed tick is logged and the loop carries on
//! at its next scheduled time.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    constants,
    ledger::EvictionPolicy,
    provider::{Provider, ProviderError},
    seed,
    state::{StateHandle, WatchState},
    BlockId,
};

mod gaps;
mod historical;
mod latest;

pub use gaps::{GapStep, GapWalker};
pub use historical::{HistoricalWalker, WalkStep};
pub use latest::{gap_range, LatestPoller, LatestTick};

#[derive(Clone, Debug)]
pub struct WatchConfig {
    /// Bars kept in the ledger.
    pub max_blocks: usize,
    pub eviction: EvictionPolicy,
    /// Size of the backward-walk window.
    pub max_attempts_to_show: usize,
    pub max_iterations: u64,
    /// Size of the fetched gap-block window; also the queue length above
    /// which the queue is shown truncated.
    pub max_gap_blocks_to_show: usize,
    pub gap_preview_len: usize,
    /// Gaps of this size or larger are not backfilled.
    pub demo_cap: u64,
    pub latest_interval: Duration,
    pub historical_interval: Duration,
    pub gap_interval: Duration,
    /// Known account-creation blocks fetched once at startup; empty by default.
    pub seed_blocks: Vec<BlockId>,
    pub mock_data: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            max_blocks: constants::MAX_BLOCKS,
            eviction: EvictionPolicy::default(),
            max_attempts_to_show: constants::MAX_ATTEMPTS_TO_SHOW,
            max_iterations: constants::MAX_ITERATIONS,
            max_gap_blocks_to_show: constants::MAX_GAP_BLOCKS_TO_SHOW,
            gap_preview_len: constants::GAP_PREVIEW_LEN,
            demo_cap: constants::DEMO_PURPOSE_MAX,
            latest_interval: Duration::from_millis(constants::LATEST_POLL_MS),
            historical_interval: Duration::from_millis(constants::HISTORICAL_POLL_MS),
            gap_interval: Duration::from_millis(constants::GAP_POLL_MS),
            seed_blocks: Vec::new(),
            mock_data: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Finished,
}

/// Run `tick` every `period` until it reports [`TickFlow::Finished`] or
/// shutdown is signalled. The sleep between ticks wakes early on shutdown.
pub(crate) async fn run_every<F, Fut>(
    task: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TickFlow, ProviderError>>,
{
    info!(task, ?period, "task started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        match tick().await {
            Ok(TickFlow::Continue) => {}
            Ok(TickFlow::Finished) => {
                info!(task, "task finished");
                return;
            }
            Err(e) => warn!(task, error = %e, "tick failed"),
        }
        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    info!(task, "task stopped");
}

/// Owns the shared state and spawns the polling tasks over it.
pub struct Watcher<P: ?Sized> {
    provider: Arc<P>,
    state: StateHandle,
    config: WatchConfig,
}

impl<P: Provider + ?Sized + 'static> Watcher<P> {
    pub fn new(provider: Arc<P>, config: WatchConfig) -> Self {
        let state = StateHandle::new(WatchState::new(&config));
        if config.mock_data {
            seed::load_mock_entries(&state);
        }
        Self {
            provider,
            state,
            config,
        }
    }

    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    /// Start the seed fetch and the three polling loops.
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> WatchTasks {
        let mut handles = Vec::with_capacity(4);

        if !self.config.seed_blocks.is_empty() {
            let provider = self.provider.clone();
            let state = self.state.clone();
            let ids = self.config.seed_blocks.clone();
            let mut stop = shutdown.clone();
            handles.push((
                "seed",
                tokio::spawn(async move {
                    tokio::select! {
                        recorded = seed::seed_known_blocks(&*provider, &state, &ids) => {
                            info!(recorded, requested = ids.len(), "seed blocks loaded");
                        }
                        _ = stop.changed() => {}
                    }
                }),
            ));
        }

        let historical = HistoricalWalker::new(
            self.provider.clone(),
            self.state.clone(),
            self.config.max_iterations,
        );
        handles.push((
            "historical",
            tokio::spawn(historical.run(self.config.historical_interval, shutdown.clone())),
        ));

        let latest = LatestPoller::new(
            self.provider.clone(),
            self.state.clone(),
            self.config.demo_cap,
        );
        handles.push((
            "latest",
            tokio::spawn(latest.run(self.config.latest_interval, shutdown.clone())),
        ));

        let gaps = GapWalker::new(self.provider.clone(), self.state.clone());
        handles.push((
            "gaps",
            tokio::spawn(gaps.run(self.config.gap_interval, shutdown)),
        ));

        WatchTasks { handles }
    }
}

pub struct WatchTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl WatchTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every task to stop.
    pub async fn join(self) {
        for (task, handle) in self.handles {
            if let Err(e) = handle.await {
                warn!(task, error = %e, "task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_account_tx, MemoryChain};

    fn fast_config() -> WatchConfig {
        WatchConfig {
            latest_interval: Duration::from_millis(5),
            historical_interval: Duration::from_millis(5),
            gap_interval: Duration::from_millis(5),
            max_iterations: 3,
            mock_data: false,
            ..WatchConfig::default()
        }
    }

    #[tokio::test]
    async fn shutdown_stops_every_task() {
        let chain = Arc::new(MemoryChain::new(1_000));
        chain.push_empty(10);
        let config = WatchConfig {
            seed_blocks: vec![BlockId::Height(1_001)],
            ..fast_config()
        };
        let watcher = Watcher::new(chain, config);
        let (tx, rx) = watch::channel(false);
        let tasks = watcher.spawn(rx);
        assert_eq!(tasks.len(), 4);

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), tasks.join())
            .await
            .expect("tasks should stop after shutdown");
    }

    #[tokio::test]
    async fn dropping_the_sender_counts_as_shutdown() {
        let chain = Arc::new(MemoryChain::new(1));
        chain.push_empty(3);
        let watcher = Watcher::new(chain, fast_config());
        let (tx, rx) = watch::channel(false);
        let tasks = watcher.spawn(rx);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(2), tasks.join())
            .await
            .expect("tasks should stop when the sender is gone");
    }

    #[tokio::test]
    async fn watcher_records_creations_from_the_chain() {
        let chain = Arc::new(MemoryChain::new(2_000));
        chain.push_empty(2);
        chain.push_block(vec![vec![create_account_tx("near", "fresh.near")]]);
        chain.push_empty(1);
        let watcher = Watcher::new(chain, fast_config());
        let state = watcher.state();
        let (tx, rx) = watch::channel(false);
        let tasks = watcher.spawn(rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        tasks.join().await;

        let snapshot = state.snapshot();
        assert_eq!(snapshot.ledger.display_key(), "2002");
        assert_eq!(snapshot.ledger.entries[0].accounts[0].id, "fresh.near");
        assert!(snapshot.traversal_done());
        assert!(snapshot.recent_blocks.len() <= 3);
    }

    #[test]
    fn mock_data_is_loaded_by_default() {
        let chain = Arc::new(MemoryChain::new(1));
        let watcher = Watcher::new(chain, WatchConfig::default());
        assert_eq!(watcher.state().ledger_snapshot().len(), 4);
    }
}
