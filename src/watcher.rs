//! Periodic balance, price and activity refresh for a connected wallet.
//!
//! The watcher owns its timer: it starts when spawned and stops on [`WalletWatcher::stop`]
//! or when dropped.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use solana_sdk::pubkey::Pubkey;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, warn};

use crate::{
    account::{recent_activity, ActivityRecord, WalletBalances},
    price::{sol_price_or_zero, PriceSource},
    rpc::RpcAccessor,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Shorter intervals are raised to this floor.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WalletSnapshot {
    pub balances: WalletBalances,
    pub sol_price: f64,
    pub total_usd: f64,
    pub activity: Vec<ActivityRecord>,
    pub refreshes: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

pub struct WalletWatcher {
    snapshots: watch::Receiver<WalletSnapshot>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl WalletWatcher {
    /// Refreshes immediately, then every `interval` (at least [`MIN_POLL_INTERVAL`]).
    pub fn spawn<R, P>(
        rpc: Arc<R>,
        prices: Arc<P>,
        owner: Pubkey,
        interval: Duration,
        activity_limit: usize,
    ) -> Self
    where
        R: RpcAccessor + ?Sized + 'static,
        P: PriceSource + ?Sized + 'static,
    {
        let interval = if interval < MIN_POLL_INTERVAL {
            warn!(?interval, floor = ?MIN_POLL_INTERVAL, "Poll interval too short, using floor");
            MIN_POLL_INTERVAL
        } else {
            interval
        };
        let (snapshot_tx, snapshots) = watch::channel(WalletSnapshot::default());
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    // Also fires when the watcher is dropped.
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let previous = snapshot_tx.borrow().clone();
                        let next =
                            refresh(rpc.as_ref(), prices.as_ref(), &owner, activity_limit, previous)
                                .await;
                        snapshot_tx.send_replace(next);
                    }
                }
            }
            debug!(%owner, "Wallet watcher stopped");
        });

        Self {
            snapshots,
            shutdown,
            task: Some(task),
        }
    }

    pub fn latest(&self) -> WalletSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletSnapshot> {
        self.snapshots.clone()
    }

    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Wallet watcher task failed");
            }
        }
    }
}

async fn refresh<R, P>(
    rpc: &R,
    prices: &P,
    owner: &Pubkey,
    activity_limit: usize,
    previous: WalletSnapshot,
) -> WalletSnapshot
where
    R: RpcAccessor + ?Sized,
    P: PriceSource + ?Sized,
{
    let balances = match WalletBalances::fetch(rpc, owner).await {
        Ok(balances) => balances,
        Err(e) => {
            warn!(%owner, error = %e, "Balance refresh failed, keeping previous balances");
            previous.balances
        }
    };
    let sol_price = sol_price_or_zero(prices).await;
    let activity = recent_activity(rpc, owner, activity_limit).await;

    WalletSnapshot {
        balances,
        sol_price,
        total_usd: balances.total_usd(sol_price),
        activity,
        refreshes: previous.refreshes + 1,
        refreshed_at: Some(Utc::now()),
    }
}
