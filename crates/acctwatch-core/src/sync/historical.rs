use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{run_every, TickFlow};
use crate::{
    extract::extract_action,
    provider::{fetch_head, Provider, ProviderError},
    state::StateHandle,
    BlockId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkStep {
    /// The window was empty and has been seeded with the head at this height.
    Seeded(u64),
    /// Stepped back to the block at this height.
    Stepped(u64),
    /// The frontier block has no predecessor.
    ReachedGenesis,
}

/// Walks backward from the head one block per tick, following `prev_hash`.
pub struct HistoricalWalker<P: ?Sized> {
    provider: Arc<P>,
    state: StateHandle,
    max_iterations: u64,
}

impl<P: Provider + ?Sized> HistoricalWalker<P> {
    pub fn new(provider: Arc<P>, state: StateHandle, max_iterations: u64) -> Self {
        Self {
            provider,
            state,
            max_iterations,
        }
    }

    pub async fn tick(&self) -> Result<WalkStep, ProviderError> {
        let Some(frontier) = self.state.walk_frontier() else {
            let head = fetch_head(&*self.provider).await?;
            let action = extract_action(&*self.provider, &head).await?;
            self.state.push_recent_block(head.header.clone());
            self.state.record_action(&head.header, &action);
            return Ok(WalkStep::Seeded(head.height()));
        };

        let Some(prev_hash) = frontier.prev_hash else {
            return Ok(WalkStep::ReachedGenesis);
        };
        // state moves only after the block and its chunks are loaded
        let block = self.provider.block(&BlockId::Hash(prev_hash)).await?;
        let action = extract_action(&*self.provider, &block).await?;

        self.state.push_recent_block(block.header.clone());
        self.state.update_max_height(block.height());
        self.state.record_action(&block.header, &action);
        debug!(height = block.height(), ?action, "stepped back");
        Ok(WalkStep::Stepped(block.height()))
    }

    async fn step(&self) -> Result<TickFlow, ProviderError> {
        let step = self.tick().await;
        if let Ok(WalkStep::ReachedGenesis) = step {
            info!("backward walk reached genesis");
            return Ok(TickFlow::Finished);
        }
        if self.state.iterations() >= self.max_iterations {
            if let Err(e) = step {
                warn!(error = %e, "last backward step failed");
            }
            return Ok(TickFlow::Finished);
        }
        self.state.bump_iterations();
        step.map(|_| TickFlow::Continue)
    }

    pub async fn run(self, period: Duration, shutdown: watch::Receiver<bool>) {
        let walker = &self;
        run_every("historical", period, shutdown, || walker.step()).await
    }
}
