use alloy::{providers::Provider, rpc::types::BlockNumberOrTag};
use clap::{Parser, Subcommand};
use eyre::Result;
use panel_oracle::{
    anchor::{Dispatcher, sink_from_config},
    config,
    contract::{panel_event_filter, providers, source::decode_logs},
    event::normalize,
    panels::PanelStore,
};

#[derive(Parser)]
#[command(
    name = "dev-tools",
    about = "Panel oracle operator utilities"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Keccak-256 of panels/{id}.json, as served by /api/hash/{id}
    Hash {
        /// Panel id (file stem of the artifact)
        id: String,
    },
    /// Print the latest block number seen by HTTP_RPC_URL
    Head {},
    /// Re-dispatch historical PanelEventAdded logs to the configured sink
    Replay {
        /// First block, inclusive
        #[arg(long)]
        from: u64,
        /// Last block, inclusive; defaults to the chain head
        #[arg(long)]
        to: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    panel_oracle::logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Hash { id } => hash(id).await,
        Commands::Head {} => head().await,
        Commands::Replay { from, to } => replay(from, to).await,
    }
}

async fn hash(id: String) -> Result<()> {
    // only PANELS_DIR matters here; skip full config validation
    let dir = std::env::var("PANELS_DIR").unwrap_or_else(|_| "panels".into());
    let store = PanelStore::new(dir);
    match store.hash(&id).await? {
        Some(h) => println!("{h}"),
        None => eyre::bail!("no artifact for panel {id} in {}", store.dir().display()),
    }
    Ok(())
}

async fn head() -> Result<()> {
    let cfg = config::init_from_env()?;
    let provider = providers::http_public(&cfg.chain.http_rpc_url)?;
    let block = provider.get_block_number().await?;
    println!("{block}");
    Ok(())
}

async fn replay(from: u64, to: Option<u64>) -> Result<()> {
    let cfg = config::init_from_env()?;
    let provider = providers::http_public(&cfg.chain.http_rpc_url)?;
    let to = match to {
        Some(b) => BlockNumberOrTag::Number(b),
        None => BlockNumberOrTag::Latest,
    };
    let filter = panel_event_filter(cfg.chain.contract_address)
        .from_block(from)
        .to_block(to);
    let logs = provider.get_logs(&filter).await?;
    tracing::info!(count = logs.len(), from, ?to, "replaying logs");

    let dispatcher = Dispatcher::new(sink_from_config(cfg)?);
    let (mut ok, mut failed) = (0u64, 0u64);
    for raw in decode_logs(logs, cfg.flags.print_raw_logs) {
        let event = normalize(raw);
        match dispatcher.dispatch(&event).await {
            Ok(_) => ok += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!(panel_id = %event.panel_id, error = %e, "replay dispatch failed");
            }
        }
    }
    println!("replayed {ok} events, {failed} failed");
    Ok(())
}
