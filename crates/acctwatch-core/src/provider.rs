use std::sync::Arc;

use async_trait::async_trait;

use crate::{Block, BlockId, Chunk, NodeStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP error: {0}")]
    Http(u16),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// The node capability the pollers depend on. Implementations must be cheap
/// to share across tasks.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn status(&self) -> Result<NodeStatus, ProviderError>;
    async fn block(&self, id: &BlockId) -> Result<Block, ProviderError>;
    async fn chunk(&self, chunk_hash: &str) -> Result<Chunk, ProviderError>;
}

#[async_trait]
impl<P: Provider + ?Sized> Provider for Arc<P> {
    async fn status(&self) -> Result<NodeStatus, ProviderError> {
        (**self).status().await
    }

    async fn block(&self, id: &BlockId) -> Result<Block, ProviderError> {
        (**self).block(id).await
    }

    async fn chunk(&self, chunk_hash: &str) -> Result<Chunk, ProviderError> {
        (**self).chunk(chunk_hash).await
    }
}

/// Fetch the block the node currently reports as its head.
pub async fn fetch_head<P: Provider + ?Sized>(provider: &P) -> Result<Block, ProviderError> {
    let status = provider.status().await?;
    provider
        .block(&BlockId::Hash(status.sync_info.latest_block_hash))
        .await
}
