use std::{fmt, str::FromStr};

use crate::{serde_helpers::field_as_string, token::SwapDirection, SwapError};
use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;

pub const DEFAULT_SLIPPAGE_BPS: u16 = 50;

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Copy, Debug)]
pub enum TxVersion {
    #[default]
    #[serde(rename = "LEGACY")]
    Legacy,
    #[serde(rename = "V0")]
    V0,
}

impl TxVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "LEGACY",
            Self::V0 => "V0",
        }
    }
}

impl fmt::Display for TxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEGACY" => Ok(Self::Legacy),
            "V0" => Ok(Self::V0),
            _ => Err(anyhow!("{} is not a valid TxVersion", s)),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(with = "field_as_string")]
    pub input_mint: Pubkey,
    #[serde(with = "field_as_string")]
    pub output_mint: Pubkey,
    #[serde(with = "field_as_string")]
    pub amount: u64,
    pub slippage_bps: u16,
    pub tx_version: TxVersion,
}

impl QuoteRequest {
    /// Quote for swapping `amount` base units of the direction's input asset.
    pub fn new(direction: SwapDirection, amount: u64, slippage_bps: u16) -> Self {
        Self {
            input_mint: direction.input_asset().mint,
            output_mint: direction.output_asset().mint,
            amount,
            slippage_bps,
            tx_version: direction.tx_version(),
        }
    }
}

/// Aggregator quote. Opaque: it is handed back to the swap-build endpoint untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct Quote(Value);

impl Quote {
    /// Accepts a quote response body only when it is flagged `success: true`.
    pub fn from_response(body: Value) -> Result<Self, SwapError> {
        if body.get("success").and_then(Value::as_bool) == Some(true) {
            return Ok(Self(body));
        }
        let msg = body
            .get("msg")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("Quote error");
        Err(SwapError::Quote(msg.to_string()))
    }

    /// Expected output in base units, when the aggregator reports one.
    pub fn output_amount(&self) -> Option<u64> {
        let out = self.0.pointer("/data/outputAmount")?;
        out.as_u64().or_else(|| out.as_str()?.parse().ok())
    }
}
