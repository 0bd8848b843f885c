use acctwatch_core::{
    constants, extract_action, provider::fetch_head, BlockAction, BlockId, ProgressSnapshot, Provider,
};
use acctwatch_rpc::JsonRpcProvider;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "acctwatch-cli")]
#[command(about = "One-shot queries against a chain node or a running acctwatch-node")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node's sync status
    Status {
        /// JSON-RPC endpoint
        #[arg(long, env = "ACCTWATCH_RPC", default_value = constants::DEFAULT_RPC_URL)]
        rpc: String,
    },
    /// Fetch one block by height or hash
    Block {
        #[arg(long, env = "ACCTWATCH_RPC", default_value = constants::DEFAULT_RPC_URL)]
        rpc: String,
        /// Block height or hash
        id: BlockId,
    },
    /// Look for an account creation in one block (the head when no id is given)
    Scan {
        #[arg(long, env = "ACCTWATCH_RPC", default_value = constants::DEFAULT_RPC_URL)]
        rpc: String,
        /// Block height or hash
        id: Option<BlockId>,
    },
    /// Print the progress snapshot of a running acctwatch-node
    Snapshot {
        /// Node base URL (e.g. http://127.0.0.1:8080)
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
}

#[derive(Debug, Serialize)]
struct ScanReport {
    block_height: u64,
    block_hash: String,
    chunks: usize,
    #[serde(flatten)]
    action: BlockAction,
}

async fn scan<P: Provider + ?Sized>(provider: &P, id: Option<&BlockId>) -> Result<ScanReport> {
    let block = match id {
        Some(id) => provider.block(id).await?,
        None => fetch_head(provider).await?,
    };
    debug!(height = block.height(), chunks = block.chunks.len(), "scanning block");
    let action = extract_action(provider, &block).await?;
    Ok(ScanReport {
        block_height: block.height(),
        block_hash: block.hash().to_string(),
        chunks: block.chunks.len(),
        action,
    })
}

async fn snapshot(node: &str) -> Result<ProgressSnapshot> {
    let url = format!("{}/progress", node.trim_end_matches('/'));
    let res = reqwest::get(&url).await?.error_for_status()?;
    res.json().await.with_context(|| format!("unexpected body from {url}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Status { rpc } => {
            let provider = JsonRpcProvider::new(rpc)?;
            print_json(&provider.status().await?)?;
        }
        Command::Block { rpc, id } => {
            let provider = JsonRpcProvider::new(rpc)?;
            print_json(&provider.block(&id).await?)?;
        }
        Command::Scan { rpc, id } => {
            let provider = JsonRpcProvider::new(rpc)?;
            print_json(&scan(&provider, id.as_ref()).await?)?;
        }
        Command::Snapshot { node } => {
            let progress = snapshot(&node).await?;
            print_json(&progress)?;
            eprintln!("{}", progress.traversal_label());
            eprintln!("{}", progress.catch_up_label());
        }
    }
    Ok(())
}
