use std::fmt::Debug;

use log::*;
use sbt_common::Rupiah;

use crate::{
    db_types::{BalanceEntry, OrderId, TopupRequest, UserBalance},
    events::{EventProducers, TopupAnnulledEvent, TopupPaidEvent},
    helpers::new_topup_ref,
    traits::{PaymentGateway, QrisCharge, StorefrontDatabase, StorefrontError, TopupSettlement},
};

/// `DepositApi` manages the balance ledger: top-up requests, their settlement, and balance queries.
/// Debits happen on the order side; this API only ever adds money.
#[derive(Clone)]
pub struct DepositApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for DepositApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DepositApi")
    }
}

impl<B, G> DepositApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }
}

impl<B, G> DepositApi<B, G>
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    pub fn db(&self) -> &B {
        &self.db
    }

    /// Creates a top-up request and its QRIS charge. The charge is created with the provider first; the
    /// pending row is only written once the provider has accepted it. The `TOPUP-` reference prefix is what
    /// routes provider notifications to this API rather than the order flow.
    pub async fn create_topup(
        &self,
        user_id: i64,
        username: Option<&str>,
        amount: Rupiah,
    ) -> Result<(TopupRequest, QrisCharge), StorefrontError> {
        let topup_id = OrderId::from(new_topup_ref());
        let customer_ref = username.map(str::to_string).unwrap_or_else(|| user_id.to_string());
        let charge = self.gateway.create_charge(&topup_id, amount, &customer_ref).await?;
        debug!("💰️ QRIS charge {} created for top-up {topup_id}: {} due", charge.charge_id, charge.amount_due);
        let mut new_topup = crate::db_types::NewTopup::new(topup_id, user_id, amount).with_amount_due(charge.amount_due);
        if let Some(username) = username {
            new_topup = new_topup.with_username(username);
        }
        let topup = self.db.insert_topup(new_topup).await?;
        info!("💰️ Top-up {} awaiting QRIS payment of {}", topup.topup_id, topup.amount_due);
        Ok((topup, charge))
    }

    /// Records which chat message carries the top-up's QR code.
    pub async fn register_qr_message(
        &self,
        topup_id: &OrderId,
        chat_id: i64,
        message_id: i64,
    ) -> Result<TopupRequest, StorefrontError> {
        self.db.set_topup_qr_message(topup_id, chat_id, message_id).await
    }

    /// Confirms that a top-up has been paid and credits the user's balance. Duplicate confirmations report
    /// [`TopupSettlement::AlreadyProcessed`] and credit nothing.
    pub async fn complete_topup(&self, topup_id: &OrderId) -> Result<TopupSettlement, StorefrontError> {
        let settlement = self.db.settle_topup(topup_id).await?;
        match &settlement {
            TopupSettlement::Settled { topup, new_balance } => {
                info!("💰️ Top-up {} settled. User {} now holds {new_balance}", topup.topup_id, topup.user_id);
                self.call_topup_paid_hook(topup, *new_balance).await;
            },
            TopupSettlement::AlreadyProcessed { topup } => {
                debug!("💰️ Duplicate confirmation for top-up {}, already {}", topup.topup_id, topup.status);
            },
        }
        Ok(settlement)
    }

    pub async fn cancel_topup(&self, topup_id: &OrderId) -> Result<TopupRequest, StorefrontError> {
        let topup = self.db.cancel_pending_topup(topup_id).await?;
        info!("💰️ Top-up {} cancelled", topup.topup_id);
        self.call_topup_annulled_hook(&topup).await;
        Ok(topup)
    }

    pub async fn expire_topup(&self, topup_id: &OrderId) -> Result<TopupRequest, StorefrontError> {
        let topup = self.db.mark_topup_expired(topup_id).await?;
        info!("🕰️ Top-up {} expired", topup.topup_id);
        self.call_topup_annulled_hook(&topup).await;
        Ok(topup)
    }

    /// One sweep of the top-up expiry loop.
    pub async fn expire_old_topups(&self, ttl: chrono::Duration) -> Result<Vec<TopupRequest>, StorefrontError> {
        let expired = self.db.expire_old_topups(ttl).await?;
        for topup in &expired {
            self.call_topup_annulled_hook(topup).await;
        }
        Ok(expired)
    }

    pub async fn fetch_topup(&self, topup_id: &OrderId) -> Result<Option<TopupRequest>, StorefrontError> {
        self.db.fetch_topup_by_topup_id(topup_id).await
    }

    /// The user's current balance; zero for users with no ledger history.
    pub async fn balance(&self, user_id: i64) -> Result<Rupiah, StorefrontError> {
        self.db.balance_for(user_id).await
    }

    pub async fn user_balance(&self, user_id: i64) -> Result<Option<UserBalance>, StorefrontError> {
        self.db.fetch_user_balance(user_id).await
    }

    /// The user's most recent ledger entries, newest first.
    pub async fn history(&self, user_id: i64, limit: i64) -> Result<Vec<BalanceEntry>, StorefrontError> {
        self.db.transaction_history(user_id, limit).await
    }

    //----------------------------------------- Hooks --------------------------------------------

    async fn call_topup_paid_hook(&self, topup: &TopupRequest, new_balance: Rupiah) {
        for emitter in &self.producers.topup_paid_producer {
            trace!("💰️ Notifying top-up paid hook subscribers");
            let event = TopupPaidEvent::new(topup.clone(), new_balance);
            emitter.publish_event(event).await;
        }
    }

    async fn call_topup_annulled_hook(&self, topup: &TopupRequest) {
        for emitter in &self.producers.topup_annulled_producer {
            trace!("💰️ Notifying top-up annulled hook subscribers");
            let event = TopupAnnulledEvent::new(topup.clone());
            emitter.publish_event(event).await;
        }
    }
}
