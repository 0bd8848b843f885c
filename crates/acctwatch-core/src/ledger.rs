//! Bounded per-block record of created accounts, the data behind the chart.
use std::{collections::VecDeque, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub block_height: u64,
    pub block_hash: String,
    pub accounts: Vec<AccountRecord>,
}

/// Which entry goes when the ledger is over capacity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Oldest inserted entry, whatever its height.
    #[default]
    InsertionOrder,
    /// Entry with the lowest block height.
    LowestHeight,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown eviction policy `{0}` (expected `insertion` or `lowest-height`)")]
pub struct UnknownPolicy(pub String);

impl FromStr for EvictionPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insertion" | "insertion-order" | "fifo" => Ok(EvictionPolicy::InsertionOrder),
            "lowest-height" | "height" => Ok(EvictionPolicy::LowestHeight),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::InsertionOrder => f.write_str("insertion"),
            EvictionPolicy::LowestHeight => f.write_str("lowest-height"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// New height; `evicted` names the height pushed out to stay within cap.
    Inserted { evicted: Option<u64> },
    /// Known height, new account appended.
    Appended,
    /// Height already lists this account.
    Duplicate,
}

#[derive(Clone, Debug)]
pub struct AccountLedger {
    cap: usize,
    policy: EvictionPolicy,
    // insertion order
    entries: VecDeque<LedgerEntry>,
}

impl AccountLedger {
    /// A `cap` of zero is treated as one.
    pub fn new(cap: usize) -> Self {
        Self::with_policy(cap, EvictionPolicy::default())
    }

    pub fn with_policy(cap: usize, policy: EvictionPolicy) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            policy,
            entries: VecDeque::with_capacity(cap + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, height: u64) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.block_height == height)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter()
    }

    /// Record that `account_id` was created in block `height`.
    ///
    /// Idempotent per (height, account): repeating a pair changes nothing,
    /// a new account for a known height is appended to that entry.
    pub fn record_if_absent(&mut self, height: u64, hash: &str, account_id: &str) -> RecordOutcome {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.block_height == height) {
            if entry.accounts.iter().any(|a| a.id == account_id) {
                return RecordOutcome::Duplicate;
            }
            entry.accounts.push(AccountRecord {
                id: account_id.to_string(),
            });
            return RecordOutcome::Appended;
        }

        self.entries.push_back(LedgerEntry {
            block_height: height,
            block_hash: hash.to_string(),
            accounts: vec![AccountRecord {
                id: account_id.to_string(),
            }],
        });
        let evicted = if self.entries.len() > self.cap {
            self.evict()
        } else {
            None
        };
        RecordOutcome::Inserted { evicted }
    }

    fn evict(&mut self) -> Option<u64> {
        let idx = match self.policy {
            EvictionPolicy::InsertionOrder => 0,
            EvictionPolicy::LowestHeight => self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.block_height)
                .map(|(i, _)| i)?,
        };
        self.entries.remove(idx).map(|e| e.block_height)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut entries: Vec<LedgerEntry> = self.entries.iter().cloned().collect();
        entries.sort_by_key(|e| e.block_height);
        LedgerSnapshot { entries }
    }
}

/// Point-in-time copy of the ledger, sorted by ascending height.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub entries: Vec<LedgerEntry>,
}

impl LedgerSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Heights joined with commas; changes whenever the displayed bars do.
    pub fn display_key(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.block_height.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn max_accounts(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.accounts.len())
            .max()
            .unwrap_or(0)
    }

    pub fn total_accounts(&self) -> usize {
        self.entries.iter().map(|e| e.accounts.len()).sum()
    }
}
