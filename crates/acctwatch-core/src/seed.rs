use tracing::{info, warn};

use crate::{
    extract::extract_action, provider::Provider, state::StateHandle, BlockAction, BlockId,
};

/// Placeholder bars shown before the first real blocks arrive.
pub const MOCK_ENTRIES: &[(u64, &str, &[&str])] = &[
    (898382, "x9k3", &["user02 (mock data)"]),
    (898383, "29kx", &["jake145 (mock data)"]),
    (898384, "aa93", &["aloha (mock data)", "honua (mock data)"]),
    (
        898385,
        "kv55",
        &["merlinmike (mock data)", "vitalik (mock data)", "jonesie (mock data)"],
    ),
];

pub fn load_mock_entries(state: &StateHandle) {
    for (height, hash, accounts) in MOCK_ENTRIES {
        for account in accounts.iter() {
            state.record_if_absent(*height, hash, account);
        }
    }
}

/// Fetch each known account-creation block once and record what it holds.
/// A block that fails to load is skipped. Returns how many blocks were
/// recorded.
pub async fn seed_known_blocks<P: Provider + ?Sized>(
    provider: &P,
    state: &StateHandle,
    ids: &[BlockId],
) -> usize {
    let mut recorded = 0;
    for id in ids {
        let block = match provider.block(id).await {
            Ok(block) => block,
            Err(e) => {
                warn!(block = %id, error = %e, "failed to fetch seed block");
                continue;
            }
        };
        match extract_action(provider, &block).await {
            Ok(action @ BlockAction::CreateAccount(_)) => {
                state.record_action(&block.header, &action);
                recorded += 1;
            }
            Ok(BlockAction::None) => {
                info!(block = %id, "seed block holds no account creation")
            }
            Err(e) => warn!(block = %id, error = %e, "failed to scan seed block"),
        }
    }
    recorded
}
