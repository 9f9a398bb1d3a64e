//! Static asset definitions, amount scaling and associated token account derivation.

use std::{fmt, str::FromStr};

use anyhow::{anyhow, Error};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account_interface::address::get_associated_token_address;

use crate::{quote::TxVersion, SwapError};

/// Wrapped SOL. Native balances are reported in SOL, swaps route through this mint.
pub const SOL: Asset = Asset {
    symbol: "SOL",
    mint: Pubkey::from_str_const("So11111111111111111111111111111111111111112"),
    decimals: 9,
};

/// Devnet USDC.
pub const USDC: Asset = Asset {
    symbol: "USDC",
    mint: Pubkey::from_str_const("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
    decimals: 6,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    pub symbol: &'static str,
    pub mint: Pubkey,
    pub decimals: u8,
}

impl Asset {
    /// Scales a user-entered decimal amount into base units.
    ///
    /// Fractional digits beyond the asset's precision are truncated. Amounts
    /// that are empty, negative, non-numeric or round down to zero are rejected.
    pub fn to_raw_amount(&self, amount: &str) -> Result<u64, SwapError> {
        let invalid = || SwapError::InvalidAmount(amount.to_string());

        let trimmed = amount.trim();
        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let digits = self.decimals as usize;
        let scale = 10u64.checked_pow(self.decimals as u32).ok_or_else(invalid)?;
        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };

        let mut fraction: String = fraction.chars().take(digits).collect();
        while fraction.len() < digits {
            fraction.push('0');
        }
        let fraction: u64 = if fraction.is_empty() {
            0
        } else {
            fraction.parse().map_err(|_| invalid())?
        };

        let raw = whole
            .checked_mul(scale)
            .and_then(|w| w.checked_add(fraction))
            .ok_or_else(invalid)?;
        if raw == 0 {
            return Err(invalid());
        }
        Ok(raw)
    }

    pub fn to_ui_amount(&self, raw: u64) -> f64 {
        raw as f64 / 10f64.powi(self.decimals as i32)
    }

    pub fn associated_token_address(&self, owner: &Pubkey) -> Pubkey {
        associated_token_address(&self.mint, owner)
    }
}

/// Derives the associated token account of `owner` for `mint`.
///
/// The owner may be off-curve (smart wallets are PDAs), so no curve check is made.
pub fn associated_token_address(mint: &Pubkey, owner: &Pubkey) -> Pubkey {
    get_associated_token_address(owner, mint)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    UsdcToSol,
    SolToUsdc,
}

impl SwapDirection {
    pub fn input_asset(&self) -> Asset {
        match self {
            Self::UsdcToSol => USDC,
            Self::SolToUsdc => SOL,
        }
    }

    pub fn output_asset(&self) -> Asset {
        match self {
            Self::UsdcToSol => SOL,
            Self::SolToUsdc => USDC,
        }
    }

    /// The aggregator builds legacy transactions for USDC->SOL and v0 for SOL->USDC.
    pub fn tx_version(&self) -> TxVersion {
        match self {
            Self::UsdcToSol => TxVersion::Legacy,
            Self::SolToUsdc => TxVersion::V0,
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}",
            self.input_asset().symbol,
            self.output_asset().symbol
        )
    }
}

impl FromStr for SwapDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "usdc-to-sol" => Ok(Self::UsdcToSol),
            "sol-to-usdc" => Ok(Self::SolToUsdc),
            _ => Err(anyhow!("{} is not a valid SwapDirection", s)),
        }
    }
}
