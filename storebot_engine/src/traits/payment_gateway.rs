use chrono::{DateTime, Utc};
use sbt_common::Rupiah;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::OrderId;

/// The contract for the QRIS payment provider.
///
/// The provider is a black box: we hand it a reference and an amount, it hands back a QR payload and later
/// tells us (via webhook or polling) whether the charge was paid. The charged amount may differ from the
/// requested amount by a small uniquifier, which is how free-text notifications are matched back to charges.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// Creates a QRIS charge for the given reference. Callers must persist `amount_due` from the returned
    /// charge, not the requested amount, since the provider may add a uniquifier.
    async fn create_charge(
        &self,
        reference: &OrderId,
        amount: Rupiah,
        customer_ref: &str,
    ) -> Result<QrisCharge, GatewayError>;

    /// Queries the current state of a charge. This is the polling fallback for when the webhook is missed.
    async fn charge_status(&self, reference: &OrderId) -> Result<QrisChargeStatus, GatewayError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrisCharge {
    pub charge_id: String,
    pub reference: OrderId,
    /// The amount we asked the provider to charge.
    pub amount: Rupiah,
    /// The amount the buyer will actually transfer, including the uniquifier.
    pub amount_due: Rupiah,
    /// The QRIS payload to render as a QR code.
    pub qr_content: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeState {
    Pending,
    Completed,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrisChargeStatus {
    pub state: ChargeState,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not initialize gateway client: {0}")]
    Initialization(String),
    #[error("Gateway request failed: {0}")]
    RequestFailed(String),
    #[error("The gateway rejected the charge: {0}")]
    ChargeRejected(String),
    #[error("The gateway does not know charge {0}")]
    ChargeNotFound(String),
}
