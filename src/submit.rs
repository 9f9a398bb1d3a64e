//! Hands normalized swap instructions to the passkey smart-wallet relay.

use std::{fmt, str::FromStr};

use anyhow::{anyhow, Error};
use async_trait::async_trait;
use solana_sdk::{
    instruction::Instruction, message::AddressLookupTableAccount, pubkey::Pubkey,
    signature::Signature,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    normalize::{is_compute_budget, NormalizedSwap},
    SwapError,
};

/// Compute-unit ceiling requested from the relay.
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 600_000;
pub const DEFAULT_REDIRECT_URL: &str = "exp://myapp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cluster {
    #[default]
    Devnet,
    Mainnet,
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Devnet => "devnet",
            Self::Mainnet => "mainnet",
        })
    }
}

impl FromStr for Cluster {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "devnet" => Ok(Self::Devnet),
            "mainnet" | "mainnet-beta" => Ok(Self::Mainnet),
            _ => Err(anyhow!("{} is not a valid Cluster", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOptions {
    pub compute_unit_limit: u32,
    pub cluster_simulation: Cluster,
    pub address_lookup_table_accounts: Option<Vec<AddressLookupTableAccount>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignAndSendRequest {
    pub instructions: Vec<Instruction>,
    pub transaction_options: TransactionOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOptions {
    pub redirect_url: String,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Signing cancelled by user")]
    Cancelled,
    #[error("Simulation failed: {0}")]
    SimulationFailed(String),
    #[error("Relay timed out")]
    Timeout,
    #[error("{0}")]
    Rejected(String),
}

/// Wallet capability supplied by the passkey provider.
#[async_trait]
pub trait PasskeyWallet: Send + Sync {
    /// Smart wallet address, `None` while disconnected.
    fn smart_wallet(&self) -> Option<Pubkey>;

    /// Signs with the passkey and broadcasts through the paymaster, which pays the fees.
    async fn sign_and_send(
        &self,
        request: SignAndSendRequest,
        options: &SignOptions,
    ) -> Result<Signature, RelayError>;
}

#[derive(Debug, Clone)]
pub struct SubmissionGateway {
    compute_unit_limit: u32,
    cluster: Cluster,
    options: SignOptions,
}

impl Default for SubmissionGateway {
    fn default() -> Self {
        Self::new(DEFAULT_COMPUTE_UNIT_LIMIT, Cluster::Devnet, SignOptions::default())
    }
}

impl SubmissionGateway {
    pub fn new(compute_unit_limit: u32, cluster: Cluster, options: SignOptions) -> Self {
        Self {
            compute_unit_limit,
            cluster,
            options,
        }
    }

    pub fn request(&self, normalized: NormalizedSwap) -> SignAndSendRequest {
        let received = normalized.instructions.len();
        let instructions: Vec<Instruction> = normalized
            .instructions
            .into_iter()
            .filter(|ix| !is_compute_budget(ix))
            .collect();
        if instructions.len() != received {
            warn!(
                stripped = received - instructions.len(),
                "Dropped compute budget instructions ahead of relay"
            );
        }
        let address_lookup_table_accounts =
            (!normalized.lookup_tables.is_empty()).then_some(normalized.lookup_tables);

        SignAndSendRequest {
            instructions,
            transaction_options: TransactionOptions {
                compute_unit_limit: self.compute_unit_limit,
                cluster_simulation: self.cluster,
                address_lookup_table_accounts,
            },
        }
    }

    pub async fn submit<W>(
        &self,
        wallet: &W,
        normalized: NormalizedSwap,
    ) -> Result<Signature, SwapError>
    where
        W: PasskeyWallet + ?Sized,
    {
        let request = self.request(normalized);
        info!(
            instructions = request.instructions.len(),
            compute_unit_limit = request.transaction_options.compute_unit_limit,
            cluster = %request.transaction_options.cluster_simulation,
            "Submitting swap to passkey relay"
        );

        match wallet.sign_and_send(request, &self.options).await {
            Ok(signature) => {
                info!(%signature, "Swap submitted");
                Ok(signature)
            }
            Err(e) => {
                warn!(error = %e, "Relay rejected swap");
                Err(SwapError::Submission(e.to_string()))
            }
        }
    }
}
