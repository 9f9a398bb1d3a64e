use crate::{
    quote::{Quote, QuoteRequest},
    swap::{RawTransactionPayload, SwapRequest, SwapTransactionResponse},
};
use async_trait::async_trait;
use reqwest::Response;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use tracing::{debug, info};

pub mod account;
pub mod config;
pub mod flow;
#[cfg(test)]
mod http_stub;
pub mod normalize;
pub mod price;
pub mod quote;
pub mod rpc;
pub mod serde_helpers;
pub mod submit;
pub mod swap;
pub mod token;
pub mod watcher;

pub const RAYDIUM_DEVNET_SWAP_HOST: &str = "https://transaction-v1-devnet.raydium.io";

/// Failures of a single swap invocation. Messages are meant to be shown to the user as is.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("{0}")]
    Quote(String),
    #[error("{0}")]
    Build(String),
    #[error("Failed to decode swap transaction: {0}")]
    Decode(String),
    #[error("Failed to fetch lookup table {address}: {reason}")]
    LookupTableResolution { address: Pubkey, reason: String },
    #[error("{0}")]
    Submission(String),
    #[error("Enter valid amount: {0:?}")]
    InvalidAmount(String),
    #[error("Connect wallet first")]
    WalletNotConnected,
}

/// Quote and build endpoints of a swap aggregator.
#[async_trait]
pub trait SwapAggregator: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError>;

    async fn swap_transaction(
        &self,
        request: &SwapRequest,
    ) -> Result<RawTransactionPayload, SwapError>;
}

pub struct RaydiumClient {
    client: reqwest::Client,
    base_path: String,
}

impl RaydiumClient {
    pub fn new(base_path: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_path)
    }

    pub fn with_client(client: reqwest::Client, base_path: Option<String>) -> Self {
        Self {
            client,
            base_path: base_path.unwrap_or_else(|| RAYDIUM_DEVNET_SWAP_HOST.to_string()),
        }
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError> {
        let failed = |e: String| SwapError::Quote(format!("Quote failed: {e}"));

        let response = self
            .client
            .get(format!("{}/compute/swap-base-in", self.base_path))
            .query(request)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let response = check_response(response).await.map_err(failed)?;
        let body: Value = response.json().await.map_err(|e| failed(e.to_string()))?;
        let quote = Quote::from_response(body)?;

        info!(
            input_mint = %request.input_mint,
            output_mint = %request.output_mint,
            amount = request.amount,
            out_amount = ?quote.output_amount(),
            "Quote received"
        );
        Ok(quote)
    }

    pub async fn swap_transaction(
        &self,
        request: &SwapRequest,
    ) -> Result<RawTransactionPayload, SwapError> {
        let failed = |e: String| SwapError::Build(format!("Swap transaction failed: {e}"));

        let response = self
            .client
            .post(format!("{}/transaction/swap-base-in", self.base_path))
            .json(request)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let response = check_response(response).await.map_err(failed)?;
        let body: SwapTransactionResponse =
            response.json().await.map_err(|e| failed(e.to_string()))?;
        let payload = body.into_payload(request.tx_version)?;

        debug!(
            wallet = %request.wallet,
            version = %payload.version,
            bytes = payload.transaction.len(),
            "Swap transaction built"
        );
        Ok(payload)
    }
}

#[async_trait]
impl SwapAggregator for RaydiumClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError> {
        RaydiumClient::quote(self, request).await
    }

    async fn swap_transaction(
        &self,
        request: &SwapRequest,
    ) -> Result<RawTransactionPayload, SwapError> {
        RaydiumClient::swap_transaction(self, request).await
    }
}

async fn check_response(response: Response) -> Result<Response, String> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(format!("request failed with status {status}: {body}"))
}
