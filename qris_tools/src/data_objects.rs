use chrono::{DateTime, Utc};
use sbt_common::Rupiah;
use serde::{Deserialize, Serialize};

/// The provider's lifecycle states for a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeLifecycle {
    Pending,
    Completed,
    Expired,
    Cancelled,
}

/// The request body for creating a charge. The provider adds a small uniquifier to `amount` and reports the
/// result back as `amount_due`, so that bank-side notifications can be matched by amount alone.
#[derive(Debug, Clone, Serialize)]
pub struct NewCharge {
    pub reference: String,
    pub merchant_id: String,
    pub amount: Rupiah,
    pub customer_ref: String,
}

/// A charge as the provider reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeResource {
    pub id: String,
    pub reference: String,
    /// The amount we asked for.
    pub amount: Rupiah,
    /// The amount the buyer will actually transfer, uniquifier included.
    pub amount_due: Rupiah,
    /// The QRIS payload, rendered client-side as a QR code.
    pub qr_string: String,
    pub status: ChargeLifecycle,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}
