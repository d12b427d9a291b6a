use sbt_common::Rupiah;
use serde::{Deserialize, Serialize};

use crate::db_types::{Credential, Order, PaymentStatus, TopupRequest};

/// Fired when an order is settled: the buyer has paid and the credentials have been allocated. Subscribers
/// typically deliver the credentials to the buyer and clean up the QR message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub credentials: Vec<Credential>,
}

impl OrderPaidEvent {
    pub fn new(order: Order, credentials: Vec<Credential>) -> Self {
        Self { order, credentials }
    }
}

/// Fired when a pending order leaves the lifecycle without being paid, whether by cancellation or expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: PaymentStatus,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

/// Fired when a top-up settles and the user's balance has been credited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupPaidEvent {
    pub topup: TopupRequest,
    pub new_balance: Rupiah,
}

impl TopupPaidEvent {
    pub fn new(topup: TopupRequest, new_balance: Rupiah) -> Self {
        Self { topup, new_balance }
    }
}

/// Fired when a pending top-up is cancelled or expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupAnnulledEvent {
    pub topup: TopupRequest,
    pub status: PaymentStatus,
}

impl TopupAnnulledEvent {
    pub fn new(topup: TopupRequest) -> Self {
        let status = topup.status;
        Self { topup, status }
    }
}

/// Fired after a sale leaves a product's unsold pool at or below the restock threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowStockEvent {
    pub product_id: i64,
    pub product_name: String,
    pub remaining: i64,
}

/// A free-form operational alert for store admins, e.g. a settlement that had to be refunded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAlertEvent {
    pub message: String,
}

impl AdminAlertEvent {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into() }
    }
}
