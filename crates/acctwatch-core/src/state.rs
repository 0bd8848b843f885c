//! The state the polling tasks share. Tasks only reach it through
//! [`StateHandle`]; the lock is never held across an await point.
use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    extract::BlockAction,
    ledger::{AccountLedger, LedgerSnapshot, RecordOutcome},
    sync::{gap_range, WatchConfig},
    BlockHeader,
};

/// FIFO window holding at most `cap` items; pushing past the cap drops the
/// oldest.
#[derive(Clone, Debug)]
pub struct RecentWindow<T> {
    cap: usize,
    items: VecDeque<T>,
}

impl<T> RecentWindow<T> {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            items: VecDeque::with_capacity(cap),
        }
    }

    /// Returns the item trimmed to make room, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        let trimmed = if self.items.len() >= self.cap {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        trimmed
    }

    /// Most recently pushed item.
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// Heights waiting to be fetched, oldest first, without duplicates.
#[derive(Clone, Debug, Default)]
pub struct GapQueue {
    heights: VecDeque<u64>,
}

impl GapQueue {
    /// Returns false when `height` is already queued.
    pub fn enqueue(&mut self, height: u64) -> bool {
        if self.heights.contains(&height) {
            return false;
        }
        self.heights.push_back(height);
        true
    }

    pub fn dequeue(&mut self) -> Option<u64> {
        self.heights.pop_front()
    }

    pub fn front(&self) -> Option<u64> {
        self.heights.front().copied()
    }

    pub fn contains(&self, height: u64) -> bool {
        self.heights.contains(&height)
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.heights.iter().copied()
    }
}

#[derive(Debug)]
pub struct WatchState {
    ledger: AccountLedger,
    gaps: GapQueue,
    max_height_checked: u64,
    recent_blocks: RecentWindow<BlockHeader>,
    gap_blocks: RecentWindow<BlockHeader>,
    iterations: u64,
    max_iterations: u64,
    gap_preview_len: usize,
    last_checked: Option<DateTime<Local>>,
}

impl WatchState {
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            ledger: AccountLedger::with_policy(config.max_blocks, config.eviction),
            gaps: GapQueue::default(),
            max_height_checked: 0,
            recent_blocks: RecentWindow::new(config.max_attempts_to_show),
            gap_blocks: RecentWindow::new(config.max_gap_blocks_to_show),
            iterations: 0,
            max_iterations: config.max_iterations,
            gap_preview_len: config.gap_preview_len,
            last_checked: None,
        }
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    pub fn gaps(&self) -> &GapQueue {
        &self.gaps
    }

    pub fn max_height_checked(&self) -> u64 {
        self.max_height_checked
    }

    pub fn recent_blocks(&self) -> &RecentWindow<BlockHeader> {
        &self.recent_blocks
    }

    pub fn gap_blocks(&self) -> &RecentWindow<BlockHeader> {
        &self.gap_blocks
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let queued = self.gaps.len();
        let truncated = queued > self.gap_blocks.cap();
        let preview_len = if truncated { self.gap_preview_len } else { queued };
        ProgressSnapshot {
            ledger: self.ledger.snapshot(),
            max_height_checked: self.max_height_checked,
            gap_queue_len: queued,
            gap_queue_preview: self.gaps.iter().take(preview_len).collect(),
            gap_queue_truncated: truncated,
            recent_blocks: self.recent_blocks.iter().cloned().collect(),
            gap_blocks: self.gap_blocks.iter().cloned().collect(),
            iterations: self.iterations,
            max_iterations: self.max_iterations,
            last_checked: self.last_checked,
        }
    }
}

/// Cloneable handle to the shared [`WatchState`].
#[derive(Clone, Debug)]
pub struct StateHandle {
    inner: Arc<RwLock<WatchState>>,
}

impl StateHandle {
    pub fn new(state: WatchState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub fn record_if_absent(&self, height: u64, hash: &str, account_id: &str) -> RecordOutcome {
        let outcome = self
            .inner
            .write()
            .ledger
            .record_if_absent(height, hash, account_id);
        match outcome {
            RecordOutcome::Inserted { evicted } => {
                info!(height, account = account_id, ?evicted, "recorded account creation")
            }
            RecordOutcome::Appended => {
                info!(height, account = account_id, "appended account to block")
            }
            RecordOutcome::Duplicate => debug!(height, account = account_id, "already recorded"),
        }
        outcome
    }

    /// Record the block's account creation, if it has one.
    pub fn record_action(&self, header: &BlockHeader, action: &BlockAction) -> Option<RecordOutcome> {
        let created = action.account_creation()?;
        Some(self.record_if_absent(header.height, &header.hash, &created.receiver_id))
    }

    pub fn enqueue_gap(&self, height: u64) -> bool {
        self.inner.write().gaps.enqueue(height)
    }

    /// Queue every height in `heights` not already queued. Returns how many
    /// were added.
    pub fn enqueue_gaps(&self, heights: impl IntoIterator<Item = u64>) -> usize {
        let mut state = self.inner.write();
        heights
            .into_iter()
            .filter(|h| state.gaps.enqueue(*h))
            .count()
    }

    pub fn dequeue_gap(&self) -> Option<u64> {
        self.inner.write().gaps.dequeue()
    }

    pub fn front_gap(&self) -> Option<u64> {
        self.inner.read().gaps.front()
    }

    /// Remove `height` if it is still at the front of the queue.
    pub fn finish_gap(&self, height: u64) -> bool {
        let mut state = self.inner.write();
        if state.gaps.front() == Some(height) {
            state.gaps.dequeue();
            true
        } else {
            false
        }
    }

    pub fn gap_queue_len(&self) -> usize {
        self.inner.read().gaps.len()
    }

    /// Raise the checked maximum; returns true when `height` is a new max.
    pub fn update_max_height(&self, height: u64) -> bool {
        let mut state = self.inner.write();
        if height > state.max_height_checked {
            state.max_height_checked = height;
            true
        } else {
            false
        }
    }

    pub fn max_height_checked(&self) -> u64 {
        self.inner.read().max_height_checked
    }

    /// Queue the heights skipped between the checked maximum and `head`, then
    /// raise the maximum, under one lock. Returns how many heights were queued.
    pub fn observe_head(&self, head: u64, demo_cap: u64) -> usize {
        let mut state = self.inner.write();
        let enqueued = match gap_range(state.max_height_checked, head, demo_cap) {
            Some(range) => range.filter(|h| state.gaps.enqueue(*h)).count(),
            None => 0,
        };
        state.max_height_checked = state.max_height_checked.max(head);
        enqueued
    }

    /// The lowest block the backward walk has reached so far.
    pub fn walk_frontier(&self) -> Option<BlockHeader> {
        self.inner.read().recent_blocks.last().cloned()
    }

    pub fn push_recent_block(&self, header: BlockHeader) {
        self.inner.write().recent_blocks.push(header);
    }

    pub fn push_gap_block(&self, header: BlockHeader) {
        self.inner.write().gap_blocks.push(header);
    }

    pub fn clear_gap_blocks(&self) {
        self.inner.write().gap_blocks.clear();
    }

    pub fn iterations(&self) -> u64 {
        self.inner.read().iterations
    }

    pub fn bump_iterations(&self) -> u64 {
        let mut state = self.inner.write();
        state.iterations += 1;
        state.iterations
    }

    pub fn mark_checked(&self, at: DateTime<Local>) {
        self.inner.write().last_checked = Some(at);
    }

    pub fn ledger_snapshot(&self) -> LedgerSnapshot {
        self.inner.read().ledger.snapshot()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.read().snapshot()
    }

    /// Run `f` against the state under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&WatchState) -> R) -> R {
        f(&self.inner.read())
    }
}

/// Everything a view needs to draw one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub ledger: LedgerSnapshot,
    pub max_height_checked: u64,
    pub gap_queue_len: usize,
    pub gap_queue_preview: Vec<u64>,
    pub gap_queue_truncated: bool,
    pub recent_blocks: Vec<BlockHeader>,
    pub gap_blocks: Vec<BlockHeader>,
    pub iterations: u64,
    pub max_iterations: u64,
    pub last_checked: Option<DateTime<Local>>,
}

impl ProgressSnapshot {
    pub fn traversal_done(&self) -> bool {
        self.iterations >= self.max_iterations
    }

    pub fn traversal_label(&self) -> String {
        let verb = if self.traversal_done() {
            "Traversed"
        } else {
            "Traversing"
        };
        format!(
            "{verb} backward: {}/{} times",
            self.iterations, self.max_iterations
        )
    }

    pub fn catch_up_label(&self) -> String {
        if self.gap_queue_len == 0 {
            return "Latest blocks checked.".to_string();
        }
        let heights = self
            .gap_queue_preview
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let ellipsis = if self.gap_queue_truncated { "…" } else { "" };
        format!("Need to catch up to: {heights}{ellipsis}")
    }

    pub fn last_checked_label(&self) -> String {
        self.last_checked
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}
