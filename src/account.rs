//! Display-only reads: wallet balances and recent activity.

use std::fmt;

use chrono::{DateTime, Utc};
use solana_sdk::pubkey::Pubkey;
use tracing::warn;

use crate::{
    rpc::{ReadError, RpcAccessor, SignatureInfo},
    token::{Asset, USDC},
};

pub const ACTIVITY_LIMIT: usize = 20;

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WalletBalances {
    pub sol: f64,
    pub usdc: f64,
}

impl WalletBalances {
    /// Fails only when the native balance cannot be read; USDC falls back to zero.
    pub async fn fetch<R>(rpc: &R, owner: &Pubkey) -> Result<Self, ReadError>
    where
        R: RpcAccessor + ?Sized,
    {
        let sol = native_balance(rpc, owner).await?;
        let usdc = token_balance(rpc, owner, &USDC).await;
        Ok(Self { sol, usdc })
    }

    /// Portfolio value in USD with USDC counted at par.
    pub fn total_usd(&self, sol_price: f64) -> f64 {
        self.sol * sol_price + self.usdc
    }
}

pub async fn native_balance<R>(rpc: &R, owner: &Pubkey) -> Result<f64, ReadError>
where
    R: RpcAccessor + ?Sized,
{
    let lamports = rpc.get_balance(owner).await?;
    Ok(lamports as f64 / LAMPORTS_PER_SOL)
}

/// Balance of `owner`'s associated token account for `asset`.
///
/// A missing account or failed read counts as zero.
pub async fn token_balance<R>(rpc: &R, owner: &Pubkey, asset: &Asset) -> f64
where
    R: RpcAccessor + ?Sized,
{
    let ata = asset.associated_token_address(owner);
    match rpc.get_token_account_amount(&ata).await {
        Ok(Some(raw)) => asset.to_ui_amount(raw),
        Ok(None) => 0.0,
        Err(e) => {
            warn!(symbol = asset.symbol, %ata, error = %e, "Token balance read failed");
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityStatus {
    Success,
    Failed,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub signature: String,
    pub timestamp: String,
    pub status: ActivityStatus,
    pub slot: u64,
}

impl From<SignatureInfo> for ActivityRecord {
    fn from(info: SignatureInfo) -> Self {
        let timestamp = info
            .block_time
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let status = if info.err.is_some() {
            ActivityStatus::Failed
        } else {
            ActivityStatus::Success
        };

        Self {
            signature: info.signature,
            timestamp,
            status,
            slot: info.slot,
        }
    }
}

/// Most recent signatures for `owner`, newest first. RPC failures yield an empty list.
pub async fn recent_activity<R>(rpc: &R, owner: &Pubkey, limit: usize) -> Vec<ActivityRecord>
where
    R: RpcAccessor + ?Sized,
{
    match rpc.get_signatures_for_address(owner, limit).await {
        Ok(signatures) => signatures
            .into_iter()
            .take(limit)
            .map(ActivityRecord::from)
            .collect(),
        Err(e) => {
            warn!(%owner, error = %e, "Activity read failed");
            Vec::new()
        }
    }
}
