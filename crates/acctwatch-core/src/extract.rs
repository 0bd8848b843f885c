use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;

use crate::{provider::Provider, Action, Block, Chunk, ProviderError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountCreation {
    pub receiver_id: String,
    pub signer_id: String,
}

/// What a block was found to contain. Serializes as
/// `{"action": "CreateAccount", "metadata": {...}}` or `{"action": ""}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "metadata")]
pub enum BlockAction {
    CreateAccount(AccountCreation),
    #[default]
    #[serde(rename = "")]
    None,
}

impl BlockAction {
    pub fn account_creation(&self) -> Option<&AccountCreation> {
        match self {
            BlockAction::CreateAccount(created) => Some(created),
            BlockAction::None => None,
        }
    }
}

/// Scan chunks in order for the first transaction whose leading action is an
/// account creation. Later matches in the same block are ignored.
pub fn scan_chunks(chunks: &[Chunk]) -> BlockAction {
    for chunk in chunks.iter().filter(|c| !c.transactions.is_empty()) {
        for tx in &chunk.transactions {
            let Some(first) = tx.actions.first() else {
                continue;
            };
            debug!(actions = ?tx.actions, signer = %tx.signer_id, "found transaction actions");
            match first {
                Action::CreateAccount => {
                    return BlockAction::CreateAccount(AccountCreation {
                        receiver_id: tx.receiver_id.clone(),
                        signer_id: tx.signer_id.clone(),
                    });
                }
                Action::Other(kind) => {
                    debug!(action = %kind, "no handling for action kind, skipping");
                }
            }
        }
    }
    BlockAction::None
}

/// Fetch every chunk of `block` concurrently and classify it. Any chunk
/// failure fails the whole extraction.
pub async fn extract_action<P: Provider + ?Sized>(
    provider: &P,
    block: &Block,
) -> Result<BlockAction, ProviderError> {
    let chunks = try_join_all(
        block
            .chunks
            .iter()
            .map(|c| provider.chunk(&c.chunk_hash)),
    )
    .await?;
    Ok(scan_chunks(&chunks))
}
