use std::sync::OnceLock;
use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use alloy::primitives::Address;
use dotenv::dotenv;

use crate::monitor::backoff::BackoffPolicy;

#[derive(Clone, Debug)]
pub struct FeatureFlags {
    pub print_raw_logs: bool,
}

#[derive(Clone, Debug)]
pub struct ChainConfig {
    pub ws_rpc_url: String,
    pub http_rpc_url: String,
    pub contract_address: Address,
    pub wallet_address: Address,
}

/// How the monitor reaches the event log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceMode {
    /// eth_newFilter + eth_getFilterChanges over HTTP.
    Filter,
    /// eth_subscribe over WebSocket.
    Subscription,
}

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub source_mode: SourceMode,
    pub start_margin: u64,
    pub poll_interval: Duration,
    pub backoff: BackoffPolicy,
    pub rpc_timeout: Duration,
    pub checkpoint_file: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source_mode: SourceMode::Filter,
            start_margin: 10,
            poll_interval: Duration::from_secs(2),
            backoff: BackoffPolicy::default(),
            rpc_timeout: Duration::from_secs(30),
            checkpoint_file: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub panels_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnchorTarget {
    Log,
    Http { url: String, timeout: Duration },
    Journal { path: PathBuf },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub chain: ChainConfig,
    pub monitor: MonitorConfig,
    pub api: ApiConfig,
    pub anchor: AnchorTarget,
    pub flags: FeatureFlags,
}

impl Config {
    /// Load from the process environment.
    pub fn load() -> eyre::Result<Self> {
        // dotenv() is called by init_from_env; kept out of here so load stays side-effect free
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> eyre::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ws_rpc_url =
            var("WS_RPC_URL").unwrap_or_else(|| "ws://127.0.0.1:8545".into());
        if !(ws_rpc_url.starts_with("ws://") || ws_rpc_url.starts_with("wss://"))
        {
            eyre::bail!(
                "WS_RPC_URL must start with ws:// or wss://, got: {}",
                ws_rpc_url
            );
        }
        let http_rpc_url = var("HTTP_RPC_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8545".into());
        if !(http_rpc_url.starts_with("http://")
            || http_rpc_url.starts_with("https://"))
        {
            eyre::bail!(
                "HTTP_RPC_URL must start with http:// or https://, got: {}",
                http_rpc_url
            );
        }

        let contract_s = var("CONTRACT_ADDRESS")
            .ok_or_else(|| eyre::eyre!("CONTRACT_ADDRESS is required"))?;
        let wallet_s = var("WALLET_ADDRESS")
            .ok_or_else(|| eyre::eyre!("WALLET_ADDRESS is required"))?;
        let contract_address = parse_address("CONTRACT_ADDRESS", &contract_s)?;
        let wallet_address = parse_address("WALLET_ADDRESS", &wallet_s)?;

        let defaults = MonitorConfig::default();
        let source_mode = match var("SOURCE_MODE").as_deref() {
            None => defaults.source_mode,
            Some(s) if s.eq_ignore_ascii_case("filter") => SourceMode::Filter,
            Some(s) if s.eq_ignore_ascii_case("subscription") => {
                SourceMode::Subscription
            }
            Some(other) => eyre::bail!(
                "SOURCE_MODE must be filter or subscription, got: {}",
                other
            ),
        };
        let start_margin = parse_or(&var, "START_BLOCK_MARGIN", defaults.start_margin)?;
        let poll_interval = Duration::from_millis(parse_or(
            &var,
            "POLL_INTERVAL_MS",
            defaults.poll_interval.as_millis() as u64,
        )?);
        let rpc_timeout = Duration::from_secs(parse_or(
            &var,
            "RPC_TIMEOUT_SECS",
            defaults.rpc_timeout.as_secs(),
        )?);
        let backoff_delay =
            Duration::from_millis(parse_or(&var, "BACKOFF_MS", 5_000u64)?);
        let backoff = match var("BACKOFF").as_deref() {
            None => BackoffPolicy::Fixed(backoff_delay),
            Some(s) if s.eq_ignore_ascii_case("fixed") => {
                BackoffPolicy::Fixed(backoff_delay)
            }
            Some(s) if s.eq_ignore_ascii_case("exponential") => {
                let max = Duration::from_millis(parse_or(
                    &var,
                    "BACKOFF_MAX_MS",
                    60_000u64,
                )?);
                if max < backoff_delay {
                    eyre::bail!("BACKOFF_MAX_MS must be >= BACKOFF_MS");
                }
                BackoffPolicy::Exponential {
                    initial: backoff_delay,
                    max,
                }
            }
            Some(other) => eyre::bail!(
                "BACKOFF must be fixed or exponential, got: {}",
                other
            ),
        };
        if poll_interval.is_zero() || rpc_timeout.is_zero() {
            eyre::bail!("POLL_INTERVAL_MS and RPC_TIMEOUT_SECS must be > 0");
        }
        let monitor = MonitorConfig {
            source_mode,
            start_margin,
            poll_interval,
            backoff,
            rpc_timeout,
            checkpoint_file: var("CHECKPOINT_FILE").map(PathBuf::from),
        };

        let bind_s = var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:5000".into());
        let bind_addr = SocketAddr::from_str(&bind_s)
            .map_err(|e| eyre::eyre!("Invalid BIND_ADDR {}: {}", bind_s, e))?;
        let api = ApiConfig {
            bind_addr,
            panels_dir: var("PANELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("panels")),
        };

        let anchor = if let Some(url) = var("ANCHOR_URL") {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                eyre::bail!("ANCHOR_URL must be an http(s) url, got: {}", url);
            }
            let timeout = Duration::from_secs(parse_or(
                &var,
                "ANCHOR_TIMEOUT_SECS",
                10u64,
            )?);
            AnchorTarget::Http { url, timeout }
        } else if let Some(path) = var("ANCHOR_JOURNAL") {
            AnchorTarget::Journal {
                path: PathBuf::from(path),
            }
        } else {
            AnchorTarget::Log
        };

        let flags = FeatureFlags {
            print_raw_logs: var("PRINT_RAW_LOGS").as_deref() == Some("1"),
        };

        Ok(Self {
            chain: ChainConfig {
                ws_rpc_url,
                http_rpc_url,
                contract_address,
                wallet_address,
            },
            monitor,
            api,
            anchor,
            flags,
        })
    }
}

fn parse_address(name: &str, val: &str) -> eyre::Result<Address> {
    if !val.starts_with("0x") {
        eyre::bail!("{} must start with 0x, got: {}", name, val);
    }
    if val.len() != 42 {
        eyre::bail!(
            "{} must be a 20-byte hex address (42 chars with 0x), got len {}: {}",
            name,
            val.len(),
            val
        );
    }
    Address::from_str(val).map_err(|e| eyre::eyre!("Invalid {}: {}", name, e))
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> eyre::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| eyre::eyre!("Invalid {} {:?}: {}", key, raw, e)),
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Initialize the global config from the environment (and `.env`). Call once at start-up.
pub fn init_from_env() -> eyre::Result<&'static Config> {
    dotenv().ok();
    let cfg = Config::load()?;
    Ok(init_with(cfg))
}

/// Initialize with an externally built config (tests, tools).
pub fn init_with(cfg: Config) -> &'static Config {
    CONFIG.get_or_init(|| cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const CONTRACT: &str = "0x59B649856d8c5Fb6991d30a345f0b923eA91a3f7";
    const WALLET: &str = "0xb8935eBEb1dA663C187fc9090b77E1972A909e12";

    fn load(pairs: &[(&str, &str)]) -> eyre::Result<Config> {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("CONTRACT_ADDRESS".to_string(), CONTRACT.to_string()),
            ("WALLET_ADDRESS".to_string(), WALLET.to_string()),
        ]);
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_match_listener_behaviour() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.monitor.source_mode, SourceMode::Filter);
        assert_eq!(cfg.monitor.start_margin, 10);
        assert_eq!(cfg.monitor.poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.monitor.rpc_timeout, Duration::from_secs(30));
        assert_eq!(
            cfg.monitor.backoff,
            BackoffPolicy::Fixed(Duration::from_secs(5))
        );
        assert!(cfg.monitor.checkpoint_file.is_none());
        assert_eq!(cfg.anchor, AnchorTarget::Log);
        assert_eq!(cfg.api.bind_addr.port(), 5000);
        assert_eq!(cfg.chain.wallet_address, Address::from_str(WALLET).unwrap());
    }

    #[test]
    fn contract_address_is_required() {
        let err = Config::from_lookup(|k| {
            (k == "WALLET_ADDRESS").then(|| WALLET.to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("CONTRACT_ADDRESS"));
    }

    #[test]
    fn rejects_short_address() {
        let err = load(&[("WALLET_ADDRESS", "0x1234")]).unwrap_err();
        assert!(err.to_string().contains("42 chars"));
    }

    #[test]
    fn rejects_http_ws_url() {
        assert!(load(&[("WS_RPC_URL", "http://localhost:8545")]).is_err());
    }

    #[test]
    fn exponential_backoff_and_subscription_mode() {
        let cfg = load(&[
            ("SOURCE_MODE", "subscription"),
            ("BACKOFF", "exponential"),
            ("BACKOFF_MS", "250"),
            ("BACKOFF_MAX_MS", "8000"),
            ("CHECKPOINT_FILE", "/var/lib/oracle/cursor.json"),
        ])
        .unwrap();
        assert_eq!(cfg.monitor.source_mode, SourceMode::Subscription);
        assert_eq!(
            cfg.monitor.backoff,
            BackoffPolicy::Exponential {
                initial: Duration::from_millis(250),
                max: Duration::from_secs(8),
            }
        );
        assert_eq!(
            cfg.monitor.checkpoint_file,
            Some(PathBuf::from("/var/lib/oracle/cursor.json"))
        );
    }

    #[test]
    fn anchor_url_takes_precedence_over_journal() {
        let cfg = load(&[
            ("ANCHOR_URL", "https://anchor.example/events"),
            ("ANCHOR_JOURNAL", "anchors.jsonl"),
        ])
        .unwrap();
        assert!(matches!(cfg.anchor, AnchorTarget::Http { .. }));

        let cfg = load(&[("ANCHOR_JOURNAL", "anchors.jsonl")]).unwrap();
        assert_eq!(
            cfg.anchor,
            AnchorTarget::Journal {
                path: PathBuf::from("anchors.jsonl")
            }
        );
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = load(&[("POLL_INTERVAL_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL_MS"));
        assert!(load(&[("POLL_INTERVAL_MS", "0")]).is_err());
    }
}
