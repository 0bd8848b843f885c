//! In-memory chain used to drive the extractor and the polling tasks in tests.
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    provider::Provider, Action, Block, BlockHeader, BlockId, Chunk, ChunkHeader, NodeStatus,
    ProviderError, SyncInfo, Transaction,
};

pub fn create_account_tx(signer: &str, receiver: &str) -> Transaction {
    Transaction {
        signer_id: signer.to_string(),
        receiver_id: receiver.to_string(),
        actions: vec![Action::CreateAccount, Action::Other("Transfer".into())],
    }
}

pub fn transfer_tx(signer: &str, receiver: &str) -> Transaction {
    Transaction {
        signer_id: signer.to_string(),
        receiver_id: receiver.to_string(),
        actions: vec![Action::Other("Transfer".into())],
    }
}

#[derive(Default)]
struct Inner {
    blocks: Vec<Block>,
    chunks: HashMap<String, Chunk>,
    head: Option<usize>,
    missing_heights: HashSet<u64>,
    failing_chunks: HashSet<String>,
    status_down: bool,
    block_requests: Vec<BlockId>,
}

/// A linear chain starting at `base_height`. Each pushed block becomes the
/// head.
pub struct MemoryChain {
    base_height: u64,
    inner: Mutex<Inner>,
}

impl MemoryChain {
    pub fn new(base_height: u64) -> Self {
        Self {
            base_height,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Append a block whose chunks hold the given transactions.
    pub fn push_block(&self, chunks: Vec<Vec<Transaction>>) -> Block {
        let mut inner = self.inner.lock();
        let height = self.base_height + inner.blocks.len() as u64;
        let prev_hash = inner.blocks.last().map(|b| b.header.hash.clone());
        let mut headers = Vec::with_capacity(chunks.len());
        for (i, transactions) in chunks.into_iter().enumerate() {
            let chunk_hash = format!("chunk-{height}-{i}");
            inner
                .chunks
                .insert(chunk_hash.clone(), Chunk { transactions });
            headers.push(ChunkHeader { chunk_hash });
        }
        let block = Block {
            header: BlockHeader {
                height,
                hash: format!("block-{height}"),
                prev_hash,
            },
            chunks: headers,
        };
        inner.blocks.push(block.clone());
        inner.head = Some(inner.blocks.len() - 1);
        block
    }

    /// Append `n` blocks without transactions.
    pub fn push_empty(&self, n: usize) {
        for _ in 0..n {
            self.push_block(vec![vec![]]);
        }
    }

    /// Make lookups of `height` fail as if the block was skipped.
    pub fn skip_height(&self, height: u64) {
        self.inner.lock().missing_heights.insert(height);
    }

    pub fn fail_chunk(&self, chunk_hash: &str) {
        self.inner.lock().failing_chunks.insert(chunk_hash.to_string());
    }

    pub fn restore_chunk(&self, chunk_hash: &str) {
        self.inner.lock().failing_chunks.remove(chunk_hash);
    }

    pub fn set_status_down(&self, down: bool) {
        self.inner.lock().status_down = down;
    }

    pub fn block_requests(&self) -> Vec<BlockId> {
        self.inner.lock().block_requests.clone()
    }
}

#[async_trait]
impl Provider for MemoryChain {
    async fn status(&self) -> Result<NodeStatus, ProviderError> {
        let inner = self.inner.lock();
        if inner.status_down {
            return Err(ProviderError::Unavailable("status down".into()));
        }
        let head = inner
            .head
            .map(|i| &inner.blocks[i])
            .ok_or_else(|| ProviderError::Unavailable("empty chain".into()))?;
        Ok(NodeStatus {
            sync_info: SyncInfo {
                latest_block_hash: head.header.hash.clone(),
                latest_block_height: Some(head.header.height),
            },
        })
    }

    async fn block(&self, id: &BlockId) -> Result<Block, ProviderError> {
        let mut inner = self.inner.lock();
        inner.block_requests.push(id.clone());
        let found = match id {
            BlockId::Height(h) if inner.missing_heights.contains(h) => None,
            BlockId::Height(h) => inner.blocks.iter().find(|b| b.header.height == *h),
            BlockId::Hash(hash) => inner.blocks.iter().find(|b| &b.header.hash == hash),
        };
        found
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("block {id}")))
    }

    async fn chunk(&self, chunk_hash: &str) -> Result<Chunk, ProviderError> {
        let inner = self.inner.lock();
        if inner.failing_chunks.contains(chunk_hash) {
            return Err(ProviderError::Unavailable(format!("chunk {chunk_hash}")));
        }
        inner
            .chunks
            .get(chunk_hash)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("chunk {chunk_hash}")))
    }
}
