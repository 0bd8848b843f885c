use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{debug, warn};

use super::{run_every, TickFlow};
use crate::{
    extract::{extract_action, BlockAction},
    provider::{Provider, ProviderError},
    state::StateHandle,
    Block, BlockId,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GapStep {
    /// Nothing queued; the gap-block window was cleared.
    Idle,
    Fetched { height: u64, action: BlockAction },
}

/// Backfills heights the latest poller skipped, one per tick.
pub struct GapWalker<P: ?Sized> {
    provider: Arc<P>,
    state: StateHandle,
}

impl<P: Provider + ?Sized> GapWalker<P> {
    pub fn new(provider: Arc<P>, state: StateHandle) -> Self {
        Self { provider, state }
    }

    /// The front height leaves the queue once its block and chunks are
    /// loaded. A `NotFound` drops it; any other failure keeps it at the
    /// front for the next tick.
    pub async fn tick(&self) -> Result<GapStep, ProviderError> {
        let Some(height) = self.state.front_gap() else {
            self.state.clear_gap_blocks();
            return Ok(GapStep::Idle);
        };

        let (block, action) = match self.fetch(height).await {
            Ok(fetched) => fetched,
            Err(e @ ProviderError::NotFound(_)) => {
                self.state.finish_gap(height);
                warn!(height, error = %e, "dropping gap height the node cannot serve");
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        self.state.finish_gap(height);
        self.state.push_gap_block(block.header.clone());
        self.state.record_action(&block.header, &action);
        debug!(height, ?action, "backfilled gap block");
        Ok(GapStep::Fetched { height, action })
    }

    async fn fetch(&self, height: u64) -> Result<(Block, BlockAction), ProviderError> {
        let block = self.provider.block(&BlockId::Height(height)).await?;
        let action = extract_action(&*self.provider, &block).await?;
        Ok((block, action))
    }

    async fn step(&self) -> Result<TickFlow, ProviderError> {
        self.tick().await?;
        Ok(TickFlow::Continue)
    }

    pub async fn run(self, period: Duration, shutdown: watch::Receiver<bool>) {
        let walker = &self;
        run_every("gaps", period, shutdown, || walker.step()).await
    }
}
