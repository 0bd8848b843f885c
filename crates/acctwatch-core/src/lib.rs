//! Block and transaction model shared by the acctwatch crates, plus the
//! account ledger, the provider seam and the polling tasks built on them.
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, fmt, str::FromStr};

pub mod constants;
pub mod extract;
pub mod ledger;
pub mod provider;
pub mod seed;
pub mod state;
pub mod sync;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use extract::{extract_action, scan_chunks, AccountCreation, BlockAction};
pub use ledger::{AccountLedger, AccountRecord, EvictionPolicy, LedgerEntry, LedgerSnapshot, RecordOutcome};
pub use provider::{Provider, ProviderError};
pub use state::{GapQueue, ProgressSnapshot, RecentWindow, StateHandle, WatchState};

/// Identifies a block either by height or by hash. Serialized untagged so it
/// can be passed straight through as a positional RPC parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockId {
    Height(u64),
    Hash(String),
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Height(h) => write!(f, "{h}"),
            BlockId::Hash(hash) => f.write_str(hash),
        }
    }
}

impl FromStr for BlockId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(s.parse::<u64>()
            .map(BlockId::Height)
            .unwrap_or_else(|_| BlockId::Hash(s.to_string())))
    }
}

impl From<u64> for BlockId {
    fn from(height: u64) -> Self {
        BlockId::Height(height)
    }
}

impl From<&str> for BlockId {
    fn from(hash: &str) -> Self {
        BlockId::Hash(hash.to_string())
    }
}

impl From<String> for BlockId {
    fn from(hash: String) -> Self {
        BlockId::Hash(hash)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncInfo {
    pub latest_block_hash: String,
    #[serde(default)]
    pub latest_block_height: Option<u64>,
}

/// Subset of the node `status` response the pollers rely on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub sync_info: SyncInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: String,
    /// `None` only for the genesis block.
    #[serde(default)]
    pub prev_hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHeader {
    pub chunk_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    #[serde(default)]
    pub chunks: Vec<ChunkHeader>,
}

impl Block {
    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn hash(&self) -> &str {
        &self.header.hash
    }

    pub fn prev_hash(&self) -> Option<&str> {
        self.header.prev_hash.as_deref()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub signer_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// A transaction action. Only account creation is interpreted; every other
/// kind is carried by name.
///
/// On the wire, field-less actions are bare strings (`"CreateAccount"`) and
/// the rest are single-key objects (`{"Transfer": {"deposit": "1"}}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAction", into = "RawAction")]
pub enum Action {
    CreateAccount,
    Other(String),
}

impl Action {
    pub fn from_kind(kind: &str) -> Self {
        if kind == constants::CREATE_ACCOUNT {
            Action::CreateAccount
        } else {
            Action::Other(kind.to_string())
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Action::CreateAccount => constants::CREATE_ACCOUNT,
            Action::Other(kind) => kind,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawAction {
    Bare(String),
    Tagged(serde_json::Map<String, serde_json::Value>),
}

impl From<RawAction> for Action {
    fn from(raw: RawAction) -> Self {
        match raw {
            RawAction::Bare(kind) => Action::from_kind(&kind),
            RawAction::Tagged(map) => {
                Action::from_kind(map.keys().next().map(String::as_str).unwrap_or_default())
            }
        }
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        RawAction::Bare(action.kind().to_string())
    }
}
