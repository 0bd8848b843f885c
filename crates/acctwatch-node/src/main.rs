use std::{net::SocketAddr, sync::Arc};

use acctwatch_core::sync::Watcher;
use acctwatch_rpc::WatchArgs;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;

#[derive(Parser, Debug)]
#[command(name = "acctwatch-node")]
#[command(about = "Headless account-creation watcher with an HTTP read API")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "ACCTWATCH_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,

    #[command(flatten)]
    watch: WatchArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let provider = Arc::new(args.watch.provider()?);
    let watcher = Watcher::new(provider, args.watch.watch_config());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = watcher.spawn(shutdown_rx);
    let app = api::router(watcher.state());

    let addr: SocketAddr = args.listen.parse()?;
    info!(rpc = %args.watch.rpc, "acctwatch-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    tasks.join().await;
    info!("all tasks stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn listen_and_watch_flags_parse_together() {
        let args = Args::try_parse_from([
            "acctwatch-node",
            "--listen",
            "0.0.0.0:9000",
            "--rpc",
            "http://localhost:3030",
            "--max-blocks",
            "10",
        ])
        .unwrap();
        assert_eq!(args.listen, "0.0.0.0:9000");
        assert_eq!(args.watch.rpc, "http://localhost:3030");
        assert_eq!(args.watch.watch_config().max_blocks, 10);
    }
}
