use std::{env, str::FromStr, time::Duration};

use anyhow::{bail, Context, Result};

use crate::{
    account::ACTIVITY_LIMIT,
    price::DEFAULT_SOL_PRICE_URL,
    quote::DEFAULT_SLIPPAGE_BPS,
    submit::{Cluster, DEFAULT_COMPUTE_UNIT_LIMIT, DEFAULT_REDIRECT_URL},
    swap::DEFAULT_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS,
    watcher::DEFAULT_POLL_INTERVAL,
    RAYDIUM_DEVNET_SWAP_HOST,
};

pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";

#[derive(Debug, Clone, PartialEq)]
pub struct SwapConfig {
    pub rpc_url: String,
    pub swap_host: String,
    pub price_url: String,
    pub slippage_bps: u16,
    pub compute_unit_price_micro_lamports: u64,
    pub compute_unit_limit: u32,
    pub cluster: Cluster,
    pub redirect_url: String,
    pub poll_interval: Duration,
    pub activity_limit: usize,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            swap_host: RAYDIUM_DEVNET_SWAP_HOST.to_string(),
            price_url: DEFAULT_SOL_PRICE_URL.to_string(),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            compute_unit_price_micro_lamports: DEFAULT_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS,
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
            cluster: Cluster::Devnet,
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            activity_limit: ACTIVITY_LIMIT,
        }
    }
}

impl SwapConfig {
    /// Defaults overridden by any of the supported environment variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("SOLANA_RPC_URL") {
            config.rpc_url = v;
        }
        if let Some(v) = get("RAYDIUM_SWAP_HOST") {
            config.swap_host = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("SOL_PRICE_URL") {
            config.price_url = v;
        }
        if let Some(v) = get("SWAP_SLIPPAGE_BPS") {
            config.slippage_bps = parse("SWAP_SLIPPAGE_BPS", &v)?;
        }
        if let Some(v) = get("SWAP_COMPUTE_UNIT_PRICE") {
            config.compute_unit_price_micro_lamports = parse("SWAP_COMPUTE_UNIT_PRICE", &v)?;
        }
        if let Some(v) = get("SWAP_COMPUTE_UNIT_LIMIT") {
            config.compute_unit_limit = parse("SWAP_COMPUTE_UNIT_LIMIT", &v)?;
        }
        if let Some(v) = get("SWAP_CLUSTER") {
            config.cluster = v.parse()?;
        }
        if let Some(v) = get("SWAP_REDIRECT_URL") {
            config.redirect_url = v;
        }
        if let Some(v) = get("WALLET_POLL_INTERVAL_SECS") {
            let secs: u64 = parse("WALLET_POLL_INTERVAL_SECS", &v)?;
            if secs == 0 {
                bail!("WALLET_POLL_INTERVAL_SECS must be at least 1");
            }
            config.poll_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} has invalid value {value:?}"))
}
