//! `SqliteDatabase` is the concrete SQLite backend of the storefront engine.
//!
//! Most methods are thin compositions of the functions in [`super::db`]. The interesting ones are the
//! settlement methods, which build the multi-statement atomic transactions the
//! [`StorefrontDatabase`] contract demands.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sbt_common::Rupiah;
use sqlx::SqlitePool;

use super::db::{balances, credentials, new_pool, orders, products, topups, vouchers};
use crate::{
    db_types::{
        BalanceEntry,
        Credential,
        EntryType,
        NewCredential,
        NewOrder,
        NewProduct,
        NewTopup,
        NewVoucher,
        Order,
        OrderId,
        PaymentStatus,
        Product,
        TopupRequest,
        UserBalance,
        Voucher,
    },
    order_objects::{ModifyOrderRequest, OrderQueryFilter, ProductUpdate},
    traits::{OrderSettlement, StorefrontDatabase, StorefrontError, TopupSettlement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database instance, returning an error if the connection could not be established.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StorefrontError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl StorefrontDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    //----------------------------------------- Products -----------------------------------------

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(id, &mut conn).await?)
    }

    async fn fetch_active_products(&self) -> Result<Vec<Product>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_active_products(&mut conn).await?)
    }

    async fn fetch_products_in_category(&self, category_id: i64) -> Result<Vec<Product>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_products_in_category(category_id, &mut conn).await?)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn update_product(&self, id: i64, update: ProductUpdate) -> Result<Product, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        products::update_product(id, update, &mut conn).await
    }

    async fn deactivate_product(&self, id: i64) -> Result<Product, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        products::deactivate_product(id, &mut conn).await
    }

    //----------------------------------------- Credentials --------------------------------------

    async fn import_credentials(&self, creds: Vec<NewCredential>) -> Result<u64, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let count = credentials::import_credentials(creds, &mut tx).await?;
        tx.commit().await?;
        Ok(count)
    }

    async fn available_stock(&self, product_id: i64) -> Result<i64, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(credentials::available_stock(product_id, &mut conn).await?)
    }

    async fn sold_count_for_category(&self, category_id: i64) -> Result<i64, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(credentials::sold_count_for_category(category_id, &mut conn).await?)
    }

    async fn credentials_for_order(&self, order_pk: i64) -> Result<Vec<Credential>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(credentials::credentials_for_order(order_pk, &mut conn).await?)
    }

    async fn withdraw_unsold_credentials(&self, product_id: i64) -> Result<Vec<Credential>, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let withdrawn = credentials::withdraw_unsold_credentials(product_id, &mut tx).await?;
        tx.commit().await?;
        Ok(withdrawn)
    }

    //----------------------------------------- Orders -------------------------------------------

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StorefrontError> {
        // The awaited commit guarantees the pending row is visible to other pool connections before this
        // returns. A bare pooled connection offers no such guarantee, and the reconciler may look the order
        // up immediately.
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::search_orders(query, &mut conn).await?)
    }

    async fn update_order(&self, order_id: &OrderId, update: ModifyOrderRequest) -> Result<Order, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order(order_id, update, &mut conn)
            .await?
            .ok_or_else(|| StorefrontError::OrderNotFound(order_id.clone()))
    }

    async fn set_order_qr_message(
        &self,
        order_id: &OrderId,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Order, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        orders::set_qr_message(order_id, chat_id, message_id, &mut conn).await
    }

    async fn cancel_pending_order(&self, order_id: &OrderId) -> Result<Order, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        match orders::transition_pending_order(order_id, PaymentStatus::Cancelled, &mut conn).await? {
            Some(order) => Ok(order),
            None => {
                let order = orders::fetch_order_by_order_id(order_id, &mut conn)
                    .await?
                    .ok_or_else(|| StorefrontError::OrderNotFound(order_id.clone()))?;
                Err(StorefrontError::OrderNotPending { order_id: order_id.clone(), status: order.status })
            },
        }
    }

    async fn mark_order_expired(&self, order_id: &OrderId) -> Result<Order, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        match orders::transition_pending_order(order_id, PaymentStatus::Expired, &mut conn).await? {
            Some(order) => Ok(order),
            None => {
                let order = orders::fetch_order_by_order_id(order_id, &mut conn)
                    .await?
                    .ok_or_else(|| StorefrontError::OrderNotFound(order_id.clone()))?;
                Err(StorefrontError::OrderNotPending { order_id: order_id.clone(), status: order.status })
            },
        }
    }

    async fn find_pending_order_by_amount(
        &self,
        amount: Rupiah,
        tolerance: i64,
    ) -> Result<Option<Order>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::find_pending_by_amount(amount, tolerance, &mut conn).await?)
    }

    /// The settlement primitive: conditional `pending -> paid` plus credential allocation in one
    /// transaction. See the trait docs for the contract.
    async fn settle_order(&self, order_id: &OrderId) -> Result<OrderSettlement, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::transition_pending_order(order_id, PaymentStatus::Paid, &mut tx).await? {
            Some(order) => order,
            None => {
                // Zero rows matched: either the order is unknown, or it has already left `pending`.
                let order = orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| StorefrontError::OrderNotFound(order_id.clone()))?;
                debug!("🗃️ Order {order_id} is already {}. Settlement is a no-op.", order.status);
                return Ok(OrderSettlement::AlreadyProcessed { order });
            },
        };
        let allocated = credentials::allocate_credentials(order.product_id, order.quantity, order.id, &mut tx).await?;
        if (allocated.len() as i64) < order.quantity {
            // Rolling back undoes both the status flip and the partial allocation. The order stays pending.
            let requested = order.quantity;
            let available = allocated.len() as i64;
            drop(tx);
            warn!(
                "🗃️ Order {order_id} needs {requested} credentials of product {} but only {available} are unsold. \
                 Settlement rolled back.",
                order.product_id
            );
            // Re-fetch, since the row returned by the update was rolled back with it.
            let mut conn = self.pool.acquire().await?;
            let order = orders::fetch_order_by_order_id(order_id, &mut conn)
                .await?
                .ok_or_else(|| StorefrontError::OrderNotFound(order_id.clone()))?;
            return Ok(OrderSettlement::InsufficientStock { order, requested, available });
        }
        tx.commit().await?;
        debug!("🗃️ Order {order_id} settled with {} credentials", allocated.len());
        Ok(OrderSettlement::Settled { order, credentials: allocated })
    }

    async fn expire_old_orders(&self, ttl: Duration) -> Result<Vec<Order>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        orders::expire_orders(ttl, &mut conn).await
    }

    //----------------------------------------- Balance ledger -----------------------------------

    async fn fetch_user_balance(&self, user_id: i64) -> Result<Option<UserBalance>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(balances::fetch_user_balance(user_id, &mut conn).await?)
    }

    async fn balance_for(&self, user_id: i64) -> Result<Rupiah, StorefrontError> {
        let balance = self.fetch_user_balance(user_id).await?.map(|b| b.balance).unwrap_or_else(|| Rupiah::from(0));
        Ok(balance)
    }

    async fn credit_balance(
        &self,
        user_id: i64,
        username: Option<&str>,
        amount: Rupiah,
        entry_type: EntryType,
        description: &str,
        order_pk: Option<i64>,
        topup_pk: Option<i64>,
    ) -> Result<Rupiah, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let new_balance =
            balances::credit_balance(user_id, username, amount, entry_type, description, order_pk, topup_pk, &mut tx)
                .await?;
        tx.commit().await?;
        Ok(new_balance)
    }

    async fn debit_balance(
        &self,
        user_id: i64,
        amount: Rupiah,
        description: &str,
        order_pk: i64,
    ) -> Result<Rupiah, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let new_balance = balances::debit_balance(user_id, amount, description, order_pk, &mut tx).await?;
        tx.commit().await?;
        Ok(new_balance)
    }

    async fn transaction_history(&self, user_id: i64, limit: i64) -> Result<Vec<BalanceEntry>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(balances::transaction_history(user_id, limit, &mut conn).await?)
    }

    //----------------------------------------- Top-ups ------------------------------------------

    async fn insert_topup(&self, topup: NewTopup) -> Result<TopupRequest, StorefrontError> {
        // Same visibility guarantee as insert_order.
        let mut tx = self.pool.begin().await?;
        let topup = topups::insert_topup(topup, &mut tx).await?;
        tx.commit().await?;
        Ok(topup)
    }

    async fn fetch_topup_by_topup_id(&self, topup_id: &OrderId) -> Result<Option<TopupRequest>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(topups::fetch_topup_by_topup_id(topup_id, &mut conn).await?)
    }

    async fn find_pending_topup_by_amount(
        &self,
        amount: Rupiah,
        tolerance: i64,
    ) -> Result<Option<TopupRequest>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(topups::find_pending_by_amount(amount, tolerance, &mut conn).await?)
    }

    async fn set_topup_qr_message(
        &self,
        topup_id: &OrderId,
        chat_id: i64,
        message_id: i64,
    ) -> Result<TopupRequest, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        topups::set_qr_message(topup_id, chat_id, message_id, &mut conn).await
    }

    async fn cancel_pending_topup(&self, topup_id: &OrderId) -> Result<TopupRequest, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        match topups::transition_pending_topup(topup_id, PaymentStatus::Cancelled, &mut conn).await? {
            Some(topup) => Ok(topup),
            None => {
                let topup = topups::fetch_topup_by_topup_id(topup_id, &mut conn)
                    .await?
                    .ok_or_else(|| StorefrontError::TopupNotFound(topup_id.clone()))?;
                Err(StorefrontError::TopupNotPending { topup_id: topup_id.clone(), status: topup.status })
            },
        }
    }

    async fn mark_topup_expired(&self, topup_id: &OrderId) -> Result<TopupRequest, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        match topups::transition_pending_topup(topup_id, PaymentStatus::Expired, &mut conn).await? {
            Some(topup) => Ok(topup),
            None => {
                let topup = topups::fetch_topup_by_topup_id(topup_id, &mut conn)
                    .await?
                    .ok_or_else(|| StorefrontError::TopupNotFound(topup_id.clone()))?;
                Err(StorefrontError::TopupNotPending { topup_id: topup_id.clone(), status: topup.status })
            },
        }
    }

    /// Conditional `pending -> paid` plus the ledger credit in one transaction. A duplicate settlement
    /// matches zero rows on the status flip and credits nothing.
    async fn settle_topup(&self, topup_id: &OrderId) -> Result<TopupSettlement, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let topup = match topups::transition_pending_topup(topup_id, PaymentStatus::Paid, &mut tx).await? {
            Some(topup) => topup,
            None => {
                let topup = topups::fetch_topup_by_topup_id(topup_id, &mut tx)
                    .await?
                    .ok_or_else(|| StorefrontError::TopupNotFound(topup_id.clone()))?;
                debug!("🗃️ Top-up {topup_id} is already {}. Settlement is a no-op.", topup.status);
                return Ok(TopupSettlement::AlreadyProcessed { topup });
            },
        };
        let description = format!("Top-up {}", topup.topup_id);
        let new_balance = balances::credit_balance(
            topup.user_id,
            topup.username.as_deref(),
            topup.amount,
            EntryType::Topup,
            &description,
            None,
            Some(topup.id),
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!("🗃️ Top-up {topup_id} settled. {} credited to user {}", topup.amount, topup.user_id);
        Ok(TopupSettlement::Settled { topup, new_balance })
    }

    async fn expire_old_topups(&self, ttl: Duration) -> Result<Vec<TopupRequest>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        topups::expire_topups(ttl, &mut conn).await
    }

    //----------------------------------------- Vouchers -----------------------------------------

    async fn fetch_voucher(&self, code: &str) -> Result<Option<Voucher>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(vouchers::fetch_voucher(code, &mut conn).await?)
    }

    async fn redeem_voucher(&self, code: &str, order_total: Rupiah) -> Result<Voucher, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        vouchers::redeem_voucher(code, order_total, &mut conn).await
    }

    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        vouchers::insert_voucher(voucher, &mut conn).await
    }

    async fn deactivate_voucher(&self, code: &str) -> Result<Voucher, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        vouchers::deactivate_voucher(code, &mut conn).await
    }

    async fn fetch_all_vouchers(&self) -> Result<Vec<Voucher>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(vouchers::fetch_all_vouchers(&mut conn).await?)
    }

    async fn close(&mut self) -> Result<(), StorefrontError> {
        self.pool.close().await;
        Ok(())
    }
}
