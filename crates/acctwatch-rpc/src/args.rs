//! Command-line knobs shared by every binary that runs the pollers.

use std::time::Duration;

use acctwatch_core::{constants, sync::WatchConfig, BlockId, EvictionPolicy, ProviderError};
use clap::Args;

use crate::JsonRpcProvider;

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// JSON-RPC endpoint of the chain node.
    #[arg(long, env = "ACCTWATCH_RPC", default_value = constants::DEFAULT_RPC_URL)]
    pub rpc: String,

    /// Number of block bars kept in the ledger.
    #[arg(long, env = "ACCTWATCH_MAX_BLOCKS", default_value_t = constants::MAX_BLOCKS)]
    pub max_blocks: usize,

    /// Which entry leaves the ledger when it is full: `insertion` or `lowest-height`.
    #[arg(long, env = "ACCTWATCH_EVICT", default_value_t = EvictionPolicy::InsertionOrder)]
    pub evict: EvictionPolicy,

    /// Number of backward steps before the historical walk stops.
    #[arg(long, env = "ACCTWATCH_MAX_ITERATIONS", default_value_t = constants::MAX_ITERATIONS)]
    pub max_iterations: u64,

    /// Head jumps this large or larger are not backfilled.
    #[arg(long, env = "ACCTWATCH_DEMO_CAP", default_value_t = constants::DEMO_PURPOSE_MAX)]
    pub demo_cap: u64,

    /// Block heights or hashes of known account creations, fetched once at
    /// startup. Seeding is opt-in: none are fetched by default.
    #[arg(long = "seed-block", env = "ACCTWATCH_SEED_BLOCKS", value_delimiter = ',')]
    pub seed_blocks: Vec<BlockId>,

    /// Start with an empty ledger instead of the built-in sample entries.
    #[arg(long)]
    pub no_mock_data: bool,

    /// Per-request timeout for RPC calls.
    #[arg(long, default_value_t = constants::REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
}

impl WatchArgs {
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            max_blocks: self.max_blocks,
            eviction: self.evict,
            max_iterations: self.max_iterations,
            demo_cap: self.demo_cap,
            seed_blocks: self.seed_blocks.clone(),
            mock_data: !self.no_mock_data,
            ..WatchConfig::default()
        }
    }

    pub fn provider(&self) -> Result<JsonRpcProvider, ProviderError> {
        JsonRpcProvider::with_timeout(&self.rpc, Duration::from_secs(self.request_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        watch: WatchArgs,
    }

    #[test]
    fn defaults_match_the_watch_config() {
        let cli = Cli::try_parse_from(["acctwatch"]).unwrap();
        let config = cli.watch.watch_config();
        let defaults = WatchConfig::default();
        assert_eq!(config.max_blocks, defaults.max_blocks);
        assert_eq!(config.eviction, EvictionPolicy::InsertionOrder);
        assert_eq!(config.max_iterations, defaults.max_iterations);
        assert_eq!(config.demo_cap, defaults.demo_cap);
        assert!(config.mock_data);
        assert!(config.seed_blocks.is_empty());
        assert_eq!(
            cli.watch.request_timeout_secs,
            crate::json_rpc::DEFAULT_TIMEOUT.as_secs()
        );
    }

    #[test]
    fn seed_help_says_seeding_is_opt_in() {
        use clap::CommandFactory;
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("Seeding is opt-in"), "{help}");
    }

    #[test]
    fn seed_blocks_accept_heights_hashes_and_lists() {
        let cli = Cli::try_parse_from([
            "acctwatch",
            "--seed-block",
            "898382,9Xk3hash",
            "--seed-block",
            "42",
            "--evict",
            "lowest-height",
            "--no-mock-data",
        ])
        .unwrap();
        assert_eq!(
            cli.watch.seed_blocks,
            vec![
                BlockId::Height(898382),
                BlockId::Hash("9Xk3hash".into()),
                BlockId::Height(42)
            ]
        );
        let config = cli.watch.watch_config();
        assert_eq!(config.eviction, EvictionPolicy::LowestHeight);
        assert!(!config.mock_data);
    }

    #[test]
    fn unknown_eviction_policy_is_rejected() {
        assert!(Cli::try_parse_from(["acctwatch", "--evict", "random"]).is_err());
    }
}
