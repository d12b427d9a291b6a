use std::fmt::Debug;

use log::*;
use sbt_common::Rupiah;

use crate::{
    db_types::{Credential, Order, OrderId, PaymentStatus, TopupRequest},
    helpers::parse_payment_message,
    sfe_api::{DepositApi, OrderFlowApi},
    traits::{
        NotificationStatus,
        OrderSettlement,
        PaymentGateway,
        PaymentNotification,
        StorefrontDatabase,
        StorefrontError,
        TopupSettlement,
    },
    AMOUNT_MATCH_TOLERANCE,
};

/// What a payment notification turned out to mean once it was matched against the database.
#[derive(Debug, Clone)]
pub enum Reconciliation {
    OrderSettled { order: Order, credentials: Vec<Credential> },
    OrderAnnulled { order: Order },
    /// The charge was paid but the credential pool could not cover the order. The order is still pending
    /// and needs operator attention.
    StockShortfall { order: Order, requested: i64, available: i64 },
    TopupSettled { topup: TopupRequest, new_balance: Rupiah },
    TopupAnnulled { topup: TopupRequest },
    /// The referenced charge had already reached a terminal state. Nothing changed.
    AlreadyProcessed { reference: OrderId, status: PaymentStatus },
}

impl Reconciliation {
    pub fn describe(&self) -> String {
        match self {
            Reconciliation::OrderSettled { order, credentials } => {
                format!("Order {} settled with {} credential(s)", order.order_id, credentials.len())
            },
            Reconciliation::OrderAnnulled { order } => format!("Order {} is {}", order.order_id, order.status),
            Reconciliation::StockShortfall { order, requested, available } => format!(
                "Order {} was paid but only {available} of {requested} credential(s) are unsold",
                order.order_id
            ),
            Reconciliation::TopupSettled { topup, new_balance } => {
                format!("Top-up {} settled. New balance: {new_balance}", topup.topup_id)
            },
            Reconciliation::TopupAnnulled { topup } => format!("Top-up {} is {}", topup.topup_id, topup.status),
            Reconciliation::AlreadyProcessed { reference, status } => {
                format!("Charge {reference} was already {status}")
            },
        }
    }
}

/// `WebhookReconciler` maps incoming payment notifications onto the order and deposit APIs.
///
/// Notifications arrive in two shapes. Referenced notifications carry the charge reference we handed the
/// provider, and are routed on the `TOPUP-` prefix. Relayed free-text notifications carry only a message
/// like "Pembayaran Rp 50.127 dari BUDI berhasil"; the amount, which includes the uniquifier, is the only
/// way to find the matching charge. Orders are searched before top-ups.
pub struct WebhookReconciler<B, G> {
    orders: OrderFlowApi<B, G>,
    deposits: DepositApi<B, G>,
}

impl<B, G> Debug for WebhookReconciler<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookReconciler")
    }
}

impl<B, G> WebhookReconciler<B, G> {
    pub fn new(orders: OrderFlowApi<B, G>, deposits: DepositApi<B, G>) -> Self {
        Self { orders, deposits }
    }
}

impl<B, G> WebhookReconciler<B, G>
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    pub fn orders(&self) -> &OrderFlowApi<B, G> {
        &self.orders
    }

    pub fn deposits(&self) -> &DepositApi<B, G> {
        &self.deposits
    }

    pub async fn handle(&self, notification: PaymentNotification) -> Result<Reconciliation, StorefrontError> {
        match notification {
            PaymentNotification::Reference { reference, status } => self.handle_referenced(reference, status).await,
            PaymentNotification::Message { text } => self.handle_free_text(&text).await,
        }
    }

    async fn handle_referenced(
        &self,
        reference: OrderId,
        status: NotificationStatus,
    ) -> Result<Reconciliation, StorefrontError> {
        debug!("🧾️ Referenced notification for {reference}: {status:?}");
        if reference.is_topup() {
            let result = match status {
                NotificationStatus::Completed => match self.deposits.complete_topup(&reference).await? {
                    TopupSettlement::Settled { topup, new_balance } => {
                        Reconciliation::TopupSettled { topup, new_balance }
                    },
                    TopupSettlement::AlreadyProcessed { topup } => {
                        Reconciliation::AlreadyProcessed { reference, status: topup.status }
                    },
                },
                NotificationStatus::Expired => match self.deposits.expire_topup(&reference).await {
                    Ok(topup) => Reconciliation::TopupAnnulled { topup },
                    Err(StorefrontError::TopupNotPending { status, .. }) => {
                        Reconciliation::AlreadyProcessed { reference, status }
                    },
                    Err(e) => return Err(e),
                },
                NotificationStatus::Cancelled => match self.deposits.cancel_topup(&reference).await {
                    Ok(topup) => Reconciliation::TopupAnnulled { topup },
                    Err(StorefrontError::TopupNotPending { status, .. }) => {
                        Reconciliation::AlreadyProcessed { reference, status }
                    },
                    Err(e) => return Err(e),
                },
            };
            return Ok(result);
        }
        let result = match status {
            NotificationStatus::Completed => self.settle_order(&reference).await?,
            NotificationStatus::Expired => match self.orders.expire_order(&reference).await {
                Ok(order) => Reconciliation::OrderAnnulled { order },
                Err(StorefrontError::OrderNotPending { status, .. }) => {
                    Reconciliation::AlreadyProcessed { reference, status }
                },
                Err(e) => return Err(e),
            },
            NotificationStatus::Cancelled => match self.orders.cancel_order(&reference).await {
                Ok(order) => Reconciliation::OrderAnnulled { order },
                Err(StorefrontError::OrderNotPending { status, .. }) => {
                    Reconciliation::AlreadyProcessed { reference, status }
                },
                Err(e) => return Err(e),
            },
        };
        Ok(result)
    }

    /// Relayed notifications only carry an amount, so the match goes through the amount uniquifier: the
    /// oldest pending order within [`AMOUNT_MATCH_TOLERANCE`] wins, then pending top-ups are tried.
    async fn handle_free_text(&self, text: &str) -> Result<Reconciliation, StorefrontError> {
        let parsed =
            parse_payment_message(text).ok_or_else(|| StorefrontError::InvalidNotification(text.to_string()))?;
        debug!("🧾️ Relayed notification: {} paid by {}", parsed.amount, parsed.payer);
        if let Some(order) = self.orders.db().find_pending_order_by_amount(parsed.amount, AMOUNT_MATCH_TOLERANCE).await?
        {
            return self.settle_order(&order.order_id).await;
        }
        if let Some(topup) =
            self.deposits.db().find_pending_topup_by_amount(parsed.amount, AMOUNT_MATCH_TOLERANCE).await?
        {
            return match self.deposits.complete_topup(&topup.topup_id).await? {
                TopupSettlement::Settled { topup, new_balance } => {
                    Ok(Reconciliation::TopupSettled { topup, new_balance })
                },
                TopupSettlement::AlreadyProcessed { topup } => {
                    let reference = topup.topup_id.clone();
                    Ok(Reconciliation::AlreadyProcessed { reference, status: topup.status })
                },
            };
        }
        warn!("🧾️ No pending charge within tolerance of {}", parsed.amount);
        Err(StorefrontError::NoMatchingPayment(format!("{} from {}", parsed.amount, parsed.payer)))
    }

    async fn settle_order(&self, order_id: &OrderId) -> Result<Reconciliation, StorefrontError> {
        let result = match self.orders.confirm_payment(order_id).await? {
            OrderSettlement::Settled { order, credentials } => Reconciliation::OrderSettled { order, credentials },
            OrderSettlement::AlreadyProcessed { order } => {
                Reconciliation::AlreadyProcessed { reference: order.order_id.clone(), status: order.status }
            },
            OrderSettlement::InsufficientStock { order, requested, available } => {
                Reconciliation::StockShortfall { order, requested, available }
            },
        };
        Ok(result)
    }
}
