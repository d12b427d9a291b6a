use std::fmt::Debug;

use log::*;
use sbt_common::Rupiah;

use crate::{
    db_types::{Credential, NewCredential, NewOrder, NewProduct, Order, OrderId, PaymentStatus, Product},
    events::{AdminAlertEvent, EventProducers, LowStockEvent, OrderAnnulledEvent, OrderPaidEvent},
    helpers::new_order_ref,
    order_objects::{CheckoutRequest, ModifyOrderRequest, OrderQueryFilter, ProductUpdate, Quote},
    traits::{OrderSettlement, PaymentGateway, QrisCharge, StorefrontDatabase, StorefrontError, VoucherError},
    LOW_STOCK_THRESHOLD,
};

/// The outcome of a balance-paid checkout: the order was settled on the spot and the credentials are ready
/// for delivery.
#[derive(Debug, Clone)]
pub struct FulfilledOrder {
    pub order: Order,
    pub credentials: Vec<Credential>,
    pub new_balance: Rupiah,
}

/// `OrderFlowApi` is the primary API for the purchase lifecycle: quoting, checkout over both payment rails,
/// settlement, cancellation and expiry.
#[derive(Clone)]
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    pub fn db(&self) -> &B {
        &self.db
    }

    /// Prices a prospective purchase. Nothing is reserved or consumed: the voucher is validated but not
    /// redeemed, and stock can still be sold out from under the quote. The requested quantity is clamped to
    /// `[1, available_stock]`.
    pub async fn quote(
        &self,
        product_id: i64,
        quantity: i64,
        voucher_code: Option<&str>,
    ) -> Result<Quote, StorefrontError> {
        let product = self.purchasable_product(product_id).await?;
        let stock = self.db.available_stock(product_id).await?;
        if stock == 0 {
            return Err(StorefrontError::OutOfStock { product_id });
        }
        let quantity = quantity.clamp(1, stock);
        let subtotal = product.price * quantity;
        let voucher = match voucher_code {
            Some(code) => {
                let voucher = self
                    .db
                    .fetch_voucher(code)
                    .await?
                    .ok_or_else(|| VoucherError::NotFound(code.to_string()))?;
                voucher.usable_for(subtotal)?;
                Some(voucher)
            },
            None => None,
        };
        Ok(Quote::new(product, quantity, voucher))
    }

    /// Checkout paid from the buyer's balance. The order settles immediately: the balance is debited, the
    /// credentials are allocated and an [`OrderPaidEvent`] is published, all before this returns.
    ///
    /// If the debit fails the order is cancelled and [`StorefrontError::InsufficientFunds`] is returned. If
    /// the credential pool cannot cover the order after the debit, the debit is refunded, the order is
    /// cancelled and an [`AdminAlertEvent`] is raised, since the stock count and the pool disagreed.
    pub async fn checkout_with_balance(&self, req: CheckoutRequest) -> Result<FulfilledOrder, StorefrontError> {
        let quote = self.quote(req.product_id, req.quantity, req.voucher_code.as_deref()).await?;
        let order_id = OrderId::from(new_order_ref());
        debug!("🛒️ Balance checkout {order_id} for buyer {}: {}", req.buyer_id, quote.total);
        let voucher = match &quote.voucher {
            Some(v) => Some(self.db.redeem_voucher(&v.code, quote.subtotal).await?),
            None => None,
        };
        let mut new_order =
            NewOrder::new(order_id.clone(), req.buyer_id, &quote.product, quote.quantity, quote.total)
                .with_source(req.source);
        if let Some(username) = &req.buyer_username {
            new_order = new_order.with_username(username.clone());
        }
        if let Some(memo) = &req.memo {
            new_order = new_order.with_memo(memo.clone());
        }
        if let Some(v) = &voucher {
            new_order = new_order.with_discount(v.code.clone(), quote.discount);
        }
        let order = self.db.insert_order(new_order).await?;
        let description = format!("Purchase {}: {} x{}", order.order_id, order.product_name, order.quantity);
        let new_balance = match self.db.debit_balance(req.buyer_id, quote.total, &description, order.id).await {
            Ok(balance) => balance,
            Err(e) => {
                debug!("🛒️ Debit for {order_id} failed ({e}). Cancelling the order.");
                self.db.cancel_pending_order(&order_id).await?;
                return Err(e);
            },
        };
        match self.db.settle_order(&order_id).await? {
            OrderSettlement::Settled { order, credentials } => {
                self.call_order_paid_hook(&order, &credentials).await;
                self.check_low_stock(order.product_id, &order.product_name).await;
                info!("🛒️ Order {} fulfilled from balance for buyer {}", order.order_id, order.buyer_id);
                Ok(FulfilledOrder { order, credentials, new_balance })
            },
            OrderSettlement::InsufficientStock { order, requested, available } => {
                warn!(
                    "🛒️ Order {order_id} paid from balance but the pool only holds {available}/{requested} \
                     credentials. Refunding."
                );
                let refund_note = format!("Refund for unfulfillable order {}", order.order_id);
                self.db
                    .credit_balance(
                        order.buyer_id,
                        order.buyer_username.as_deref(),
                        order.total_price,
                        crate::db_types::EntryType::Refund,
                        &refund_note,
                        Some(order.id),
                        None,
                    )
                    .await?;
                let order = self.db.cancel_pending_order(&order_id).await?;
                self.call_admin_alert_hook(format!(
                    "Order {} was refunded: {requested} credential(s) of product {} requested, {available} unsold.",
                    order.order_id, order.product_id
                ))
                .await;
                self.call_order_annulled_hook(&order).await;
                Err(StorefrontError::OutOfStock { product_id: order.product_id })
            },
            OrderSettlement::AlreadyProcessed { order } => {
                // Cannot happen for a freshly inserted order, but the state machine says so, not us.
                error!("🛒️ Freshly created order {} was already {}", order.order_id, order.status);
                Err(StorefrontError::OrderNotPending { order_id, status: order.status })
            },
        }
    }

    /// Checkout paid over QRIS. The charge is created with the provider first; only once the provider has
    /// accepted it is the voucher redeemed and the pending order written. The stored `amount_due` is the
    /// provider's charged amount, uniquifier included, which is what free-text notifications match against.
    pub async fn checkout_with_qris(&self, req: CheckoutRequest) -> Result<(Order, QrisCharge), StorefrontError> {
        let quote = self.quote(req.product_id, req.quantity, req.voucher_code.as_deref()).await?;
        let order_id = OrderId::from(new_order_ref());
        let customer_ref = req.buyer_username.clone().unwrap_or_else(|| req.buyer_id.to_string());
        let charge = self.gateway.create_charge(&order_id, quote.total, &customer_ref).await?;
        debug!("🛒️ QRIS charge {} created for {order_id}: {} due", charge.charge_id, charge.amount_due);
        let voucher = match &quote.voucher {
            Some(v) => Some(self.db.redeem_voucher(&v.code, quote.subtotal).await?),
            None => None,
        };
        let mut new_order =
            NewOrder::new(order_id.clone(), req.buyer_id, &quote.product, quote.quantity, quote.total)
                .with_amount_due(charge.amount_due)
                .with_source(req.source);
        if let Some(username) = &req.buyer_username {
            new_order = new_order.with_username(username.clone());
        }
        if let Some(memo) = &req.memo {
            new_order = new_order.with_memo(memo.clone());
        }
        if let Some(v) = &voucher {
            new_order = new_order.with_discount(v.code.clone(), quote.discount);
        }
        let order = self.db.insert_order(new_order).await?;
        info!("🛒️ Order {} awaiting QRIS payment of {}", order.order_id, order.amount_due);
        Ok((order, charge))
    }

    /// Records which chat message carries the order's QR code, so a subscriber can delete it on settlement.
    pub async fn register_qr_message(
        &self,
        order_id: &OrderId,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Order, StorefrontError> {
        self.db.set_order_qr_message(order_id, chat_id, message_id).await
    }

    /// Confirms that the charge for this order has been paid and drives it through settlement. Duplicate
    /// confirmations are harmless: the settlement primitive reports [`OrderSettlement::AlreadyProcessed`]
    /// and nothing is delivered twice.
    pub async fn confirm_payment(&self, order_id: &OrderId) -> Result<OrderSettlement, StorefrontError> {
        trace!("🛒️ Confirming payment for order {order_id}");
        let settlement = self.db.settle_order(order_id).await?;
        match &settlement {
            OrderSettlement::Settled { order, credentials } => {
                self.call_order_paid_hook(order, credentials).await;
                self.check_low_stock(order.product_id, &order.product_name).await;
                info!("🛒️ Order {} confirmed and settled", order.order_id);
            },
            OrderSettlement::AlreadyProcessed { order } => {
                debug!("🛒️ Duplicate confirmation for order {}, already {}", order.order_id, order.status);
            },
            OrderSettlement::InsufficientStock { order, requested, available } => {
                self.call_admin_alert_hook(format!(
                    "Order {} was paid but cannot be fulfilled: {requested} credential(s) of product {} requested, \
                     {available} unsold. The order is still pending.",
                    order.order_id, order.product_id
                ))
                .await;
            },
        }
        Ok(settlement)
    }

    /// Cancels a pending order, e.g. when the buyer abandons the QR code.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, StorefrontError> {
        let order = self.db.cancel_pending_order(order_id).await?;
        info!("🛒️ Order {} cancelled", order.order_id);
        self.call_order_annulled_hook(&order).await;
        Ok(order)
    }

    /// Expires a single pending order, e.g. on a provider `expired` notification.
    pub async fn expire_order(&self, order_id: &OrderId) -> Result<Order, StorefrontError> {
        let order = self.db.mark_order_expired(order_id).await?;
        info!("🕰️ Order {} expired", order.order_id);
        self.call_order_annulled_hook(&order).await;
        Ok(order)
    }

    /// One sweep of the order expiry loop: every pending order older than `ttl` is expired and announced.
    pub async fn expire_old_orders(&self, ttl: chrono::Duration) -> Result<Vec<Order>, StorefrontError> {
        let expired = self.db.expire_old_orders(ttl).await?;
        for order in &expired {
            self.call_order_annulled_hook(order).await;
        }
        Ok(expired)
    }

    /// The polling fallback for a missed webhook: asks the provider for the charge state and applies
    /// whatever transition it reports. Returns the order's status after the poll.
    pub async fn poll_pending_order(&self, order_id: &OrderId) -> Result<PaymentStatus, StorefrontError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| StorefrontError::OrderNotFound(order_id.clone()))?;
        if order.status.is_terminal() {
            return Ok(order.status);
        }
        let status = self.gateway.charge_status(order_id).await?;
        use crate::traits::ChargeState::*;
        let status = match status.state {
            Pending => PaymentStatus::Pending,
            Completed => self.confirm_payment(order_id).await?.order().status,
            Expired => self.expire_order(order_id).await?.status,
            Cancelled => self.cancel_order(order_id).await?.status,
        };
        Ok(status)
    }

    //----------------------------------------- Admin surface ------------------------------------

    pub async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StorefrontError> {
        self.db.fetch_product(id).await
    }

    pub async fn fetch_active_products(&self) -> Result<Vec<Product>, StorefrontError> {
        self.db.fetch_active_products().await
    }

    pub async fn fetch_products_in_category(&self, category_id: i64) -> Result<Vec<Product>, StorefrontError> {
        self.db.fetch_products_in_category(category_id).await
    }

    pub async fn add_product(&self, product: NewProduct) -> Result<Product, StorefrontError> {
        self.db.insert_product(product).await
    }

    pub async fn update_product(&self, id: i64, update: ProductUpdate) -> Result<Product, StorefrontError> {
        self.db.update_product(id, update).await
    }

    pub async fn retire_product(&self, id: i64) -> Result<Product, StorefrontError> {
        self.db.deactivate_product(id).await
    }

    pub async fn import_credentials(&self, credentials: Vec<NewCredential>) -> Result<u64, StorefrontError> {
        self.db.import_credentials(credentials).await
    }

    pub async fn available_stock(&self, product_id: i64) -> Result<i64, StorefrontError> {
        self.db.available_stock(product_id).await
    }

    pub async fn withdraw_unsold_credentials(&self, product_id: i64) -> Result<Vec<Credential>, StorefrontError> {
        self.db.withdraw_unsold_credentials(product_id).await
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorefrontError> {
        self.db.fetch_order_by_order_id(order_id).await
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StorefrontError> {
        self.db.search_orders(query).await
    }

    /// Applies an admin's manual change to an order, bypassing the transition guard. Use with care.
    pub async fn update_order(&self, order_id: &OrderId, update: ModifyOrderRequest) -> Result<Order, StorefrontError> {
        self.db.update_order(order_id, update).await
    }

    pub async fn credentials_for_order(&self, order_pk: i64) -> Result<Vec<Credential>, StorefrontError> {
        self.db.credentials_for_order(order_pk).await
    }

    //----------------------------------------- Hooks --------------------------------------------

    async fn call_order_paid_hook(&self, order: &Order, credentials: &[Credential]) {
        for emitter in &self.producers.order_paid_producer {
            trace!("🛒️ Notifying order paid hook subscribers");
            let event = OrderPaidEvent::new(order.clone(), credentials.to_vec());
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_annulled_producer {
            trace!("🛒️ Notifying order annulled hook subscribers");
            let event = OrderAnnulledEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_admin_alert_hook(&self, message: String) {
        for emitter in &self.producers.admin_alert_producer {
            let event = AdminAlertEvent::new(message.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn check_low_stock(&self, product_id: i64, product_name: &str) {
        let remaining = match self.db.available_stock(product_id).await {
            Ok(n) => n,
            Err(e) => {
                warn!("🛒️ Could not read stock level for product {product_id}: {e}");
                return;
            },
        };
        if remaining <= LOW_STOCK_THRESHOLD {
            debug!("🛒️ Product {product_name} is down to {remaining} unsold credentials");
            for emitter in &self.producers.low_stock_producer {
                let event =
                    LowStockEvent { product_id, product_name: product_name.to_string(), remaining };
                emitter.publish_event(event).await;
            }
        }
    }

    async fn purchasable_product(&self, product_id: i64) -> Result<Product, StorefrontError> {
        let product = self
            .db
            .fetch_product(product_id)
            .await?
            .ok_or(StorefrontError::ProductNotFound(product_id))?;
        if !product.is_purchasable() {
            return Err(StorefrontError::ProductNotPurchasable(product_id));
        }
        Ok(product)
    }
}
