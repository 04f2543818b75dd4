use std::sync::OnceLock;
use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder, RootProvider, WsConnect};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use eyre::Result;

use crate::config::Config;

/// Read-only provider; no fillers, no signer.
pub type ChainProvider = RootProvider;

/// Build a public read-only WebSocket provider from a ws/wss url.
pub async fn ws_public(url: &str) -> Result<ChainProvider> {
    let ws = WsConnect::new(url);
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_ws(ws)
        .await?;
    Ok(provider)
}

/// Build a public read-only HTTP provider. Connects lazily, so an unreachable
/// endpoint only shows up on the first request.
pub fn http_public(url: &str) -> Result<ChainProvider> {
    let url: Url = url
        .parse()
        .map_err(|e| eyre::eyre!("invalid http rpc url {}: {}", url, e))?;
    Ok(RootProvider::new_http(url))
}

/// Chain clients shared by the monitor and the HTTP surface. Neither side
/// mutates them.
pub struct ProviderPool {
    http_reader: ChainProvider,
    ws_url: String,
}

static POOL: OnceLock<ProviderPool> = OnceLock::new();

/// Initialize the global provider pool from config.
pub fn init_pool(config: &Config) -> Result<&'static ProviderPool> {
    let pool = ProviderPool {
        http_reader: http_public(&config.chain.http_rpc_url)?,
        ws_url: config.chain.ws_rpc_url.clone(),
    };
    Ok(POOL.get_or_init(|| pool))
}

impl ProviderPool {
    pub fn http_reader(&self) -> ChainProvider {
        self.http_reader.clone()
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }
}

/// Latest block lookup used by `/health`.
#[async_trait]
pub trait ChainHead: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;
}

/// [`ChainHead`] backed by a provider, bounded by a timeout so a hung node
/// can't hang the health check.
pub struct ProviderHead<P> {
    provider: P,
    timeout: Duration,
}

impl<P> ProviderHead<P> {
    pub fn new(provider: P, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

#[async_trait]
impl<P: Provider + Send + Sync + 'static> ChainHead for ProviderHead<P> {
    async fn latest_block(&self) -> Result<u64> {
        let block = tokio::time::timeout(
            self.timeout,
            self.provider.get_block_number(),
        )
        .await
        .map_err(|_| eyre::eyre!("eth_blockNumber timed out after {:?}", self.timeout))??;
        Ok(block)
    }
}
