use std::{ops::RangeInclusive, sync::Arc, time::Duration};

use chrono::Local;
use tokio::sync::watch;
use tracing::{debug, info};

use super::{run_every, TickFlow};
use crate::{
    extract::{extract_action, BlockAction},
    provider::{fetch_head, Provider, ProviderError},
    state::StateHandle,
};

/// Heights to backfill when the head moved from `max_checked` to `head`:
/// `(max_checked, head]` if the jump is more than one block and below
/// `demo_cap`, otherwise nothing.
pub fn gap_range(max_checked: u64, head: u64, demo_cap: u64) -> Option<RangeInclusive<u64>> {
    let gap = head.checked_sub(max_checked)?;
    (gap > 1 && gap < demo_cap).then(|| max_checked + 1..=head)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatestTick {
    pub height: u64,
    pub action: BlockAction,
    pub gaps_enqueued: usize,
}

pub struct LatestPoller<P: ?Sized> {
    provider: Arc<P>,
    state: StateHandle,
    demo_cap: u64,
}

impl<P: Provider + ?Sized> LatestPoller<P> {
    pub fn new(provider: Arc<P>, state: StateHandle, demo_cap: u64) -> Self {
        Self {
            provider,
            state,
            demo_cap,
        }
    }

    pub async fn tick(&self) -> Result<LatestTick, ProviderError> {
        let head = fetch_head(&*self.provider).await?;
        let action = extract_action(&*self.provider, &head).await?;
        self.state.record_action(&head.header, &action);

        let gaps_enqueued = self.state.observe_head(head.height(), self.demo_cap);
        if gaps_enqueued > 0 {
            info!(head = head.height(), gaps_enqueued, "queued skipped blocks");
        }
        self.state.mark_checked(Local::now());
        debug!(head = head.height(), ?action, "polled chain head");

        Ok(LatestTick {
            height: head.height(),
            action,
            gaps_enqueued,
        })
    }

    async fn step(&self) -> Result<TickFlow, ProviderError> {
        self.tick().await?;
        Ok(TickFlow::Continue)
    }

    pub async fn run(self, period: Duration, shutdown: watch::Receiver<bool>) {
        let poller = &self;
        run_every("latest", period, shutdown, || poller.step()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::WatchState,
        sync::WatchConfig,
        testing::{create_account_tx, MemoryChain},
    };

    fn setup(base: u64) -> (Arc<MemoryChain>, StateHandle, LatestPoller<MemoryChain>) {
        let chain = Arc::new(MemoryChain::new(base));
        let state = StateHandle::new(WatchState::new(&WatchConfig::default()));
        let poller = LatestPoller::new(chain.clone(), state.clone(), 50);
        (chain, state, poller)
    }

    #[test]
    fn gap_range_bounds() {
        assert_eq!(gap_range(100, 105, 50), Some(101..=105));
        assert_eq!(gap_range(100, 102, 50), Some(101..=102));
        assert_eq!(gap_range(100, 101, 50), None);
        assert_eq!(gap_range(100, 100, 50), None);
        assert_eq!(gap_range(100, 150, 50), None);
        assert_eq!(gap_range(100, 149, 50), Some(101..=149));
        assert_eq!(gap_range(100, 90, 50), None);
    }

    #[tokio::test]
    async fn queues_exactly_the_skipped_heights() {
        let (chain, state, poller) = setup(1_000);
        chain.push_empty(10);
        state.update_max_height(1_003);

        let tick = poller.tick().await.unwrap();
        assert_eq!(tick.height, 1_009);
        assert_eq!(tick.gaps_enqueued, 6);
        let queued: Vec<u64> = state.read(|s| s.gaps().iter().collect());
        assert_eq!(queued, (1_004..=1_009).collect::<Vec<_>>());
        assert_eq!(state.max_height_checked(), 1_009);
        assert!(state.snapshot().last_checked.is_some());
    }

    #[tokio::test]
    async fn already_queued_heights_are_not_repeated() {
        let (chain, state, poller) = setup(1_000);
        chain.push_empty(10);
        state.update_max_height(1_003);
        state.enqueue_gap(1_005);

        poller.tick().await.unwrap();
        let queued: Vec<u64> = state.read(|s| s.gaps().iter().collect());
        assert_eq!(queued, vec![1_005, 1_004, 1_006, 1_007, 1_008, 1_009]);
    }

    #[tokio::test]
    async fn large_or_single_step_jumps_leave_the_queue_alone() {
        let (chain, state, poller) = setup(1_000);
        chain.push_empty(100);

        // first poll: max is 0, the jump is far above the cap
        poller.tick().await.unwrap();
        assert_eq!(state.gap_queue_len(), 0);
        assert_eq!(state.max_height_checked(), 1_099);

        chain.push_empty(1);
        let tick = poller.tick().await.unwrap();
        assert_eq!(tick.gaps_enqueued, 0);
        assert_eq!(state.gap_queue_len(), 0);
        assert_eq!(state.max_height_checked(), 1_100);

        // unchanged head
        poller.tick().await.unwrap();
        assert_eq!(state.gap_queue_len(), 0);
    }

    #[tokio::test]
    async fn head_with_creation_is_recorded() {
        let (chain, state, poller) = setup(10);
        chain.push_block(vec![vec![create_account_tx("near", "head.near")]]);
        let tick = poller.tick().await.unwrap();
        assert!(tick.action.account_creation().is_some());
        assert_eq!(state.ledger_snapshot().display_key(), "10");
    }

    #[tokio::test]
    async fn failed_status_leaves_state_untouched() {
        let (chain, state, poller) = setup(10);
        chain.push_empty(3);
        chain.set_status_down(true);
        assert!(poller.tick().await.is_err());
        assert_eq!(state.max_height_checked(), 0);
        assert!(state.snapshot().last_checked.is_none());
    }
}
