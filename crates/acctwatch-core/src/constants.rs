pub const MAX_BLOCKS: usize = 6;
pub const MAX_ATTEMPTS_TO_SHOW: usize = 3;
pub const MAX_ITERATIONS: u64 = 1991;
pub const MAX_GAP_BLOCKS_TO_SHOW: usize = 7;
pub const DEMO_PURPOSE_MAX: u64 = 50;
pub const GAP_PREVIEW_LEN: usize = 5;

pub const LATEST_POLL_MS: u64 = 5_000;
pub const HISTORICAL_POLL_MS: u64 = 250;
pub const GAP_POLL_MS: u64 = 500;

pub const DEFAULT_RPC_URL: &str = "https://rpc.testnet.near.org";
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const CREATE_ACCOUNT: &str = "CreateAccount";
