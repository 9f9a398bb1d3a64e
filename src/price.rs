//! SOL/USD spot price used to value the wallet.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_SOL_PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Failed to fetch SOL price: {0}")]
pub struct PriceError(pub String);

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current price of one SOL in USD.
    async fn sol_usd(&self) -> Result<f64, PriceError>;
}

#[derive(Deserialize, Debug)]
struct SimplePriceResponse {
    solana: UsdPrice,
}

#[derive(Deserialize, Debug)]
struct UsdPrice {
    usd: f64,
}

pub struct PriceClient {
    client: reqwest::Client,
    url: String,
}

impl PriceClient {
    pub fn new(url: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: Option<String>) -> Self {
        Self {
            client,
            url: url.unwrap_or_else(|| DEFAULT_SOL_PRICE_URL.to_string()),
        }
    }
}

#[async_trait]
impl PriceSource for PriceClient {
    async fn sol_usd(&self) -> Result<f64, PriceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PriceError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PriceError(format!(
                "request failed with status {}",
                response.status()
            )));
        }
        let body: SimplePriceResponse = response
            .json()
            .await
            .map_err(|e| PriceError(e.to_string()))?;
        debug!(usd = body.solana.usd, "SOL price received");
        Ok(body.solana.usd)
    }
}

/// SOL price, or zero when the feed is unavailable.
pub async fn sol_price_or_zero<P>(prices: &P) -> f64
where
    P: PriceSource + ?Sized,
{
    match prices.sol_usd().await {
        Ok(price) => price,
        Err(e) => {
            warn!(error = %e, "Valuing SOL at zero");
            0.0
        }
    }
}
