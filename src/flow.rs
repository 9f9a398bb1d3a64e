//! One swap invocation: quote, build, normalize, submit, refresh.

use std::sync::Arc;

use solana_sdk::signature::Signature;
use tracing::{info, warn};

use crate::{
    account::{recent_activity, ActivityRecord, WalletBalances},
    config::SwapConfig,
    normalize::normalize,
    quote::QuoteRequest,
    rpc::RpcAccessor,
    submit::{PasskeyWallet, SignOptions, SubmissionGateway},
    swap::SwapRequest,
    token::SwapDirection,
    SwapAggregator, SwapError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub signature: Signature,
    /// `None` when the post-swap balance read failed.
    pub balances: Option<WalletBalances>,
    pub activity: Vec<ActivityRecord>,
}

pub struct SwapExecutor<A, R: ?Sized, W> {
    aggregator: A,
    rpc: Arc<R>,
    wallet: W,
    gateway: SubmissionGateway,
    slippage_bps: u16,
    compute_unit_price_micro_lamports: u64,
    activity_limit: usize,
}

impl<A, R, W> SwapExecutor<A, R, W>
where
    A: SwapAggregator,
    R: RpcAccessor + ?Sized,
    W: PasskeyWallet,
{
    pub fn new(aggregator: A, rpc: Arc<R>, wallet: W, config: &SwapConfig) -> Self {
        Self {
            aggregator,
            rpc,
            wallet,
            gateway: SubmissionGateway::new(
                config.compute_unit_limit,
                config.cluster,
                SignOptions {
                    redirect_url: config.redirect_url.clone(),
                },
            ),
            slippage_bps: config.slippage_bps,
            compute_unit_price_micro_lamports: config.compute_unit_price_micro_lamports,
            activity_limit: config.activity_limit,
        }
    }

    pub fn aggregator(&self) -> &A {
        &self.aggregator
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    /// Runs a full swap of `amount` (in display units of the input asset).
    ///
    /// Nothing is retried: a failed swap must start again from a fresh quote.
    pub async fn execute(
        &self,
        direction: SwapDirection,
        amount: &str,
    ) -> Result<SwapOutcome, SwapError> {
        let owner = self
            .wallet
            .smart_wallet()
            .ok_or(SwapError::WalletNotConnected)?;
        let raw_amount = direction.input_asset().to_raw_amount(amount)?;
        info!(%direction, %owner, raw_amount, "Starting swap");

        let quote = self
            .aggregator
            .quote(&QuoteRequest::new(direction, raw_amount, self.slippage_bps))
            .await?;

        let request = SwapRequest::new(
            quote,
            owner,
            direction,
            self.compute_unit_price_micro_lamports,
        );
        let payload = self.aggregator.swap_transaction(&request).await?;

        let normalized = normalize(&payload, self.rpc.as_ref()).await?;
        let signature = self.gateway.submit(&self.wallet, normalized).await?;

        let balances = match WalletBalances::fetch(self.rpc.as_ref(), &owner).await {
            Ok(balances) => Some(balances),
            Err(e) => {
                warn!(%owner, error = %e, "Post-swap balance refresh failed");
                None
            }
        };
        let activity = recent_activity(self.rpc.as_ref(), &owner, self.activity_limit).await;

        Ok(SwapOutcome {
            signature,
            balances,
            activity,
        })
    }
}
