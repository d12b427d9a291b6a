use std::str::FromStr;

use sbt_common::Rupiah;
use serde::{Deserialize, Serialize};

use crate::db_types::{ConversionError, Credential, Order, OrderId, TopupRequest};

//--------------------------------------  OrderSettlement     --------------------------------------------------------
/// The outcome of driving an order through the settlement primitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderSettlement {
    /// The order moved from `Pending` to `Paid` and the credentials were allocated.
    Settled { order: Order, credentials: Vec<Credential> },
    /// The order was already in a terminal state. Nothing changed.
    AlreadyProcessed { order: Order },
    /// The credential pool could not cover the order. The transaction was rolled back and the order is
    /// still `Pending`.
    InsufficientStock { order: Order, requested: i64, available: i64 },
}

impl OrderSettlement {
    pub fn order(&self) -> &Order {
        match self {
            OrderSettlement::Settled { order, .. } => order,
            OrderSettlement::AlreadyProcessed { order } => order,
            OrderSettlement::InsufficientStock { order, .. } => order,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, OrderSettlement::Settled { .. })
    }
}

//--------------------------------------  TopupSettlement     --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TopupSettlement {
    /// The top-up moved from `Pending` to `Paid` and the nominal amount was credited.
    Settled { topup: TopupRequest, new_balance: Rupiah },
    /// The top-up was already in a terminal state. Nothing was credited.
    AlreadyProcessed { topup: TopupRequest },
}

impl TopupSettlement {
    pub fn topup(&self) -> &TopupRequest {
        match self {
            TopupSettlement::Settled { topup, .. } => topup,
            TopupSettlement::AlreadyProcessed { topup } => topup,
        }
    }
}

//-------------------------------------- PaymentNotification  --------------------------------------------------------
/// A payment notification, normalized from whatever shape the webhook delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentNotification {
    /// The provider supplied an explicit charge reference.
    Reference { reference: OrderId, status: NotificationStatus },
    /// A relayed free-text notification. Only the amount can identify the charge.
    Message { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Completed,
    Expired,
    Cancelled,
}

impl FromStr for NotificationStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "completed" | "paid" | "success" => Ok(Self::Completed),
            "expired" => Ok(Self::Expired),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Unknown notification status: {s}"))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn notification_status_aliases() {
        assert_eq!("PAID".parse::<NotificationStatus>().unwrap(), NotificationStatus::Completed);
        assert_eq!("success".parse::<NotificationStatus>().unwrap(), NotificationStatus::Completed);
        assert_eq!("canceled".parse::<NotificationStatus>().unwrap(), NotificationStatus::Cancelled);
        assert!("refunded".parse::<NotificationStatus>().is_err());
    }
}
