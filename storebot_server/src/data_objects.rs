use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use storebot_engine::{db_types::OrderId, NotificationStatus, PaymentNotification};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The webhook payload from the QRIS aggregator.
///
/// Aggregators are not consistent about what they send. Well-behaved providers post a charge reference and a
/// status; relay apps post the raw notification text from the banking app. Both arrive on the same endpoint,
/// so every field is optional and [`TryFrom`] decides which kind of notification this is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrisWebhookPayload {
    /// The charge reference, if the provider supplied one. Aliased because providers disagree on the name.
    #[serde(default, alias = "reference")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Raw notification text for relayed free-text notifications.
    #[serde(default)]
    pub message: Option<String>,
}

impl TryFrom<QrisWebhookPayload> for PaymentNotification {
    type Error = ServerError;

    fn try_from(payload: QrisWebhookPayload) -> Result<Self, Self::Error> {
        let reference = payload.order_id.or(payload.transaction_id);
        if let (Some(reference), Some(status)) = (reference, payload.status.as_deref()) {
            let status = NotificationStatus::from_str(status)
                .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
            return Ok(PaymentNotification::Reference { reference: OrderId(reference), status });
        }
        match payload.message {
            Some(text) if !text.trim().is_empty() => Ok(PaymentNotification::Message { text }),
            _ => Err(ServerError::InvalidRequestBody(
                "Webhook payload carries neither a charge reference nor a notification message".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialImportRequest {
    pub product_id: i64,
    /// One credential per line, `login|password[|notes]`.
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialImportResult {
    pub imported: u64,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    10
}
