//! HTTP JSON-RPC implementation of the acctwatch [`Provider`] capability,
//! plus the command-line arguments that configure a watcher over it.
pub mod args;
pub mod json_rpc;

pub use acctwatch_core::{Provider, ProviderError};
pub use args::WatchArgs;
pub use json_rpc::JsonRpcProvider;
