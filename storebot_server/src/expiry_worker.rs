//! Background sweeper for abandoned charges.
//!
//! Pending orders and top-ups hold no stock and no money, but their QR codes go stale once the provider
//! expires the charge. The sweeper marks anything older than the configured TTL as expired so that buyers
//! get a clear "start over" instead of paying into a dead charge.
use chrono::Duration;
use log::*;
use storebot_engine::{DepositApi, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::integrations::qris::QrisGateway;

pub fn start_expiry_worker(
    orders: OrderFlowApi<SqliteDatabase, QrisGateway>,
    deposits: DepositApi<SqliteDatabase, QrisGateway>,
    ttl: Duration,
    interval_secs: u64,
) -> JoinHandle<()> {
    info!("🕰️ Starting the expiry sweeper. TTL: {} minutes, interval: {interval_secs}s", ttl.num_minutes());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match orders.expire_old_orders(ttl).await {
                Ok(expired) if !expired.is_empty() => {
                    info!("🕰️ Expired {} abandoned order(s)", expired.len());
                },
                Ok(_) => trace!("🕰️ No orders to expire"),
                Err(e) => error!("🕰️ Order expiry sweep failed. {e}"),
            }
            match deposits.expire_old_topups(ttl).await {
                Ok(expired) if !expired.is_empty() => {
                    info!("🕰️ Expired {} abandoned top-up(s)", expired.len());
                },
                Ok(_) => trace!("🕰️ No top-ups to expire"),
                Err(e) => error!("🕰️ Top-up expiry sweep failed. {e}"),
            }
        }
    })
}
