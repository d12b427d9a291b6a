use chrono::Duration;
use sbt_common::Rupiah;
use thiserror::Error;

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
    traits::{data_objects::{OrderSettlement, TopupSettlement}, GatewayError},
};

/// The persistence contract for the storefront engine.
///
/// Backends must guarantee that the settlement, allocation, debit and redemption methods are atomic: either
/// the whole state change lands, or none of it does, even under concurrent callers. With SQLite this falls
/// out of conditional `UPDATE ... RETURNING` statements and the single-writer model.
#[allow(async_fn_in_trait)]
pub trait StorefrontDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    //----------------------------------------- Products -----------------------------------------

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StorefrontError>;

    /// All active catalogue entries (categories and products).
    async fn fetch_active_products(&self) -> Result<Vec<Product>, StorefrontError>;

    /// Active products under the given category.
    async fn fetch_products_in_category(&self, category_id: i64) -> Result<Vec<Product>, StorefrontError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StorefrontError>;

    /// Applies a partial update to a product. Existing orders keep their name and price snapshots.
    async fn update_product(&self, id: i64, update: ProductUpdate) -> Result<Product, StorefrontError>;

    /// Soft-deletes a product. The row stays so that order snapshots and sold credentials keep their links.
    async fn deactivate_product(&self, id: i64) -> Result<Product, StorefrontError>;

    //----------------------------------------- Credentials --------------------------------------

    /// Bulk-inserts credentials into a product's pool. Returns the number inserted.
    async fn import_credentials(&self, credentials: Vec<NewCredential>) -> Result<u64, StorefrontError>;

    /// The number of unsold credentials for the product. Advisory only: the authoritative check is the
    /// allocation inside [`Self::settle_order`].
    async fn available_stock(&self, product_id: i64) -> Result<i64, StorefrontError>;

    /// The number of credentials sold across all products in a category.
    async fn sold_count_for_category(&self, category_id: i64) -> Result<i64, StorefrontError>;

    /// The credentials delivered for a settled order.
    async fn credentials_for_order(&self, order_pk: i64) -> Result<Vec<Credential>, StorefrontError>;

    /// Removes and returns all unsold credentials for a product. Sold credentials are never touched.
    async fn withdraw_unsold_credentials(&self, product_id: i64) -> Result<Vec<Credential>, StorefrontError>;

    //----------------------------------------- Orders -------------------------------------------

    /// Inserts a new order. Fails with [`StorefrontError::OrderAlreadyExists`] if the reference is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StorefrontError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, StorefrontError>;

    /// Fetches orders matching the filter, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StorefrontError>;

    /// Applies an admin's partial update to an order. This bypasses the transition guard, so it is for
    /// manual reconciliation only.
    async fn update_order(&self, order_id: &OrderId, update: ModifyOrderRequest) -> Result<Order, StorefrontError>;

    /// Records the chat message carrying the order's QR code, so it can be deleted on settlement.
    async fn set_order_qr_message(
        &self,
        order_id: &OrderId,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Order, StorefrontError>;

    /// Conditionally moves a pending order to `Cancelled`. Returns
    /// [`StorefrontError::OrderNotPending`] if the order is already in a terminal state.
    async fn cancel_pending_order(&self, order_id: &OrderId) -> Result<Order, StorefrontError>;

    /// Conditionally moves a pending order to `Expired`.
    async fn mark_order_expired(&self, order_id: &OrderId) -> Result<Order, StorefrontError>;

    /// Finds the oldest pending order whose charged amount is within `tolerance` rupiah of `amount`. Used to
    /// match free-text payment notifications via the amount uniquifier.
    async fn find_pending_order_by_amount(
        &self,
        amount: Rupiah,
        tolerance: i64,
    ) -> Result<Option<Order>, StorefrontError>;

    /// The settlement primitive. In a single transaction:
    /// * conditionally moves the order from `Pending` to `Paid` and stamps `paid_at`;
    /// * allocates `quantity` unsold credentials (oldest first) and binds them to the order.
    ///
    /// If the pool holds fewer than `quantity` credentials the whole transaction rolls back and the order
    /// stays `Pending`. If the order is already terminal, nothing changes and
    /// [`OrderSettlement::AlreadyProcessed`] is returned, which makes duplicate confirmations harmless.
    async fn settle_order(&self, order_id: &OrderId) -> Result<OrderSettlement, StorefrontError>;

    /// Moves every pending order older than `ttl` to `Expired` and returns the expired rows.
    async fn expire_old_orders(&self, ttl: Duration) -> Result<Vec<Order>, StorefrontError>;

    //----------------------------------------- Balance ledger -----------------------------------

    async fn fetch_user_balance(&self, user_id: i64) -> Result<Option<UserBalance>, StorefrontError>;

    /// The user's current balance; zero for users with no balance row.
    async fn balance_for(&self, user_id: i64) -> Result<Rupiah, StorefrontError>;

    /// Credits the user's balance and writes the matching ledger entry in one transaction. Creates the
    /// balance row if the user has none. Returns the new balance.
    #[allow(clippy::too_many_arguments)]
    async fn credit_balance(
        &self,
        user_id: i64,
        username: Option<&str>,
        amount: Rupiah,
        entry_type: EntryType,
        description: &str,
        order_pk: Option<i64>,
        topup_pk: Option<i64>,
    ) -> Result<Rupiah, StorefrontError>;

    /// Debits the user's balance and writes the matching ledger entry in one transaction. The debit is
    /// conditional on `balance >= amount`; if the guard fails, nothing is mutated and
    /// [`StorefrontError::InsufficientFunds`] is returned. Returns the new balance.
    async fn debit_balance(
        &self,
        user_id: i64,
        amount: Rupiah,
        description: &str,
        order_pk: i64,
    ) -> Result<Rupiah, StorefrontError>;

    /// The most recent ledger entries for the user, newest first.
    async fn transaction_history(&self, user_id: i64, limit: i64) -> Result<Vec<BalanceEntry>, StorefrontError>;

    //----------------------------------------- Top-ups ------------------------------------------

    async fn insert_topup(&self, topup: NewTopup) -> Result<TopupRequest, StorefrontError>;

    async fn fetch_topup_by_topup_id(&self, topup_id: &OrderId) -> Result<Option<TopupRequest>, StorefrontError>;

    /// The top-up analogue of [`Self::find_pending_order_by_amount`].
    async fn find_pending_topup_by_amount(
        &self,
        amount: Rupiah,
        tolerance: i64,
    ) -> Result<Option<TopupRequest>, StorefrontError>;

    async fn set_topup_qr_message(
        &self,
        topup_id: &OrderId,
        chat_id: i64,
        message_id: i64,
    ) -> Result<TopupRequest, StorefrontError>;

    /// Conditionally moves a pending top-up to `Cancelled`. Returns
    /// [`StorefrontError::TopupNotPending`] if the top-up is already in a terminal state.
    async fn cancel_pending_topup(&self, topup_id: &OrderId) -> Result<TopupRequest, StorefrontError>;

    /// Conditionally moves a pending top-up to `Expired`.
    async fn mark_topup_expired(&self, topup_id: &OrderId) -> Result<TopupRequest, StorefrontError>;

    /// Conditionally moves a pending top-up to `Paid` and credits the nominal amount to the user's balance,
    /// all in one transaction. Duplicate settlements return [`TopupSettlement::AlreadyProcessed`] and credit
    /// nothing.
    async fn settle_topup(&self, topup_id: &OrderId) -> Result<TopupSettlement, StorefrontError>;

    /// Moves every pending top-up older than `ttl` to `Expired` and returns the expired rows.
    async fn expire_old_topups(&self, ttl: Duration) -> Result<Vec<TopupRequest>, StorefrontError>;

    //----------------------------------------- Vouchers -----------------------------------------

    /// Looks a voucher up by code, case-insensitively.
    async fn fetch_voucher(&self, code: &str) -> Result<Option<Voucher>, StorefrontError>;

    /// Consumes one use of the voucher. The increment is guarded in the statement itself: the voucher must
    /// be active, unexpired, under its usage cap and the order total must meet the minimum. Under concurrent
    /// redemption `used_count` can therefore never exceed `max_uses`.
    async fn redeem_voucher(&self, code: &str, order_total: Rupiah) -> Result<Voucher, StorefrontError>;

    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, StorefrontError>;

    async fn deactivate_voucher(&self, code: &str) -> Result<Voucher, StorefrontError>;

    async fn fetch_all_vouchers(&self) -> Result<Vec<Voucher>, StorefrontError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StorefrontError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StorefrontError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Product {0} is not available for purchase")]
    ProductNotPurchasable(i64),
    #[error("Product {product_id} is out of stock")]
    OutOfStock { product_id: i64 },
    #[error("Cannot insert order, since it already exists with reference {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} is {status}, not pending")]
    OrderNotPending { order_id: OrderId, status: PaymentStatus },
    #[error("The requested order change would result in a no-op.")]
    OrderModificationNoOp,
    #[error("The requested top-up {0} does not exist")]
    TopupNotFound(OrderId),
    #[error("Top-up {topup_id} is {status}, not pending")]
    TopupNotPending { topup_id: OrderId, status: PaymentStatus },
    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientFunds { required: Rupiah, available: Rupiah },
    #[error("Voucher error: {0}")]
    Voucher(#[from] VoucherError),
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("No pending charge matches the notification: {0}")]
    NoMatchingPayment(String),
    #[error("The payment notification could not be interpreted: {0}")]
    InvalidNotification(String),
}

impl From<sqlx::Error> for StorefrontError {
    fn from(e: sqlx::Error) -> Self {
        StorefrontError::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum VoucherError {
    #[error("Voucher {0} does not exist")]
    NotFound(String),
    #[error("Voucher {0} is no longer active")]
    Inactive(String),
    #[error("Voucher {0} has expired")]
    Expired(String),
    #[error("Voucher {0} has reached its usage cap")]
    CapReached(String),
    #[error("Voucher {code} requires a minimum purchase of {min}")]
    MinPurchaseNotMet { code: String, min: Rupiah },
}
