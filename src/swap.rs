use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::{
    quote::{Quote, TxVersion},
    serde_helpers::{field_as_string, option_field_as_string},
    token::{SwapDirection, SOL, USDC},
    SwapError,
};

/// Priority fee hint sent with every build request.
pub const DEFAULT_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS: u64 = 100_000;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    #[serde(with = "field_as_string")]
    pub compute_unit_price_micro_lamports: u64,
    pub swap_response: Quote,
    pub tx_version: TxVersion,
    #[serde(with = "field_as_string")]
    pub wallet: Pubkey,
    #[serde(
        with = "option_field_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_account: Option<Pubkey>,
    #[serde(
        with = "option_field_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub output_account: Option<Pubkey>,
    pub wrap_sol: bool,
    pub unwrap_sol: bool,
}

impl SwapRequest {
    /// Build request for `quote`, with token accounts derived for `wallet`.
    ///
    /// USDC->SOL spends from the USDC account into the wrapped-SOL account and
    /// unwraps. SOL->USDC wraps native SOL and only names the USDC output account.
    pub fn new(
        quote: Quote,
        wallet: Pubkey,
        direction: SwapDirection,
        compute_unit_price_micro_lamports: u64,
    ) -> Self {
        let usdc_account = USDC.associated_token_address(&wallet);
        let (input_account, output_account, wrap_sol, unwrap_sol) = match direction {
            SwapDirection::UsdcToSol => (
                Some(usdc_account),
                Some(SOL.associated_token_address(&wallet)),
                false,
                true,
            ),
            SwapDirection::SolToUsdc => (None, Some(usdc_account), true, false),
        };

        Self {
            compute_unit_price_micro_lamports,
            swap_response: quote,
            tx_version: direction.tx_version(),
            wallet,
            input_account,
            output_account,
            wrap_sol,
            unwrap_sol,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SwapTransactionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Vec<SwapTransactionData>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SwapTransactionData {
    pub transaction: String,
}

/// Base64 transaction bytes as returned by the aggregator, tagged with the
/// version they were built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransactionPayload {
    pub transaction: String,
    pub version: TxVersion,
}

impl SwapTransactionResponse {
    pub fn into_payload(self, version: TxVersion) -> Result<RawTransactionPayload, SwapError> {
        if !self.success {
            return Err(SwapError::Build(
                self.msg
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Swap error".to_string()),
            ));
        }
        let transaction = self
            .data
            .into_iter()
            .next()
            .ok_or_else(|| SwapError::Build("No transaction in swap response".to_string()))?
            .transaction;

        Ok(RawTransactionPayload {
            transaction,
            version,
        })
    }
}
