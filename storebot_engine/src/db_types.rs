use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use sbt_common::Rupiah;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::traits::VoucherError;

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
/// The lifecycle status of a charge. Orders and top-up requests share the same state machine:
/// `Pending` may move to exactly one of the three terminal states, and terminal states never change again.
/// Balance-paid orders are born `Paid` and skip the pending window entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// The charge has been created and we are waiting for the payment provider to report settlement.
    Pending,
    /// The payment has been received in full.
    Paid,
    /// The pending window lapsed without payment.
    Expired,
    /// The charge was cancelled by the buyer or an admin before payment.
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Expired => write!(f, "expired"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentStatus::Pending
        })
    }
}

//--------------------------------------        OrderId        -------------------------------------------------------
/// The provider-facing reference for a charge. Orders carry an `ORD-` prefix; top-up requests carry `TOPUP-`.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this reference identifies a top-up request rather than an order.
    pub fn is_topup(&self) -> bool {
        self.0.starts_with("TOPUP-")
    }
}

//--------------------------------------     OrderSource       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    Bot,
    Web,
}

impl Display for OrderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSource::Bot => write!(f, "bot"),
            OrderSource::Web => write!(f, "web"),
        }
    }
}

//--------------------------------------       Product        --------------------------------------------------------
/// A catalogue entry. Categories are products with `is_category` set; purchasable products hang off a
/// category via `parent_id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Rupiah,
    pub is_active: bool,
    pub is_category: bool,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// A product can be bought iff it is active and not a category node.
    pub fn is_purchasable(&self) -> bool {
        self.is_active && !self.is_category
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Rupiah,
    pub is_category: bool,
    pub parent_id: Option<i64>,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Rupiah) -> Self {
        Self { name: name.into(), description: String::new(), price, is_category: false, parent_id: None }
    }

    pub fn category<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), description: String::new(), price: Rupiah::from(0), is_category: true, parent_id: None }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.parent_id = Some(category_id);
        self
    }
}

//--------------------------------------      Credential       -------------------------------------------------------
/// A sellable account credential. Once sold, a credential is bound to exactly one order forever.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Credential {
    pub id: i64,
    pub product_id: i64,
    pub login: String,
    pub password: String,
    pub pin: Option<String>,
    pub extra_info: Option<String>,
    pub is_sold: bool,
    pub sold_at: Option<DateTime<Utc>>,
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// Renders the credential in the pipe-delimited import/export format, with `-` for absent fields.
    pub fn pipe_line(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.login,
            self.password,
            self.pin.as_deref().unwrap_or("-"),
            self.extra_info.as_deref().unwrap_or("-")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCredential {
    pub product_id: i64,
    pub login: String,
    pub password: String,
    pub pin: Option<String>,
    pub extra_info: Option<String>,
}

impl NewCredential {
    pub fn new<S: Into<String>>(product_id: i64, login: S, password: S) -> Self {
        Self { product_id, login: login.into(), password: password.into(), pin: None, extra_info: None }
    }
}

//--------------------------------------        Order         --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: i64,
    pub buyer_username: Option<String>,
    pub product_id: i64,
    /// Snapshot of the product name at purchase time. Product rows can be edited or retired later.
    pub product_name: String,
    pub quantity: i64,
    /// The price after discount.
    pub total_price: Rupiah,
    /// The exact amount the payment gateway charges. On the QRIS path this includes the uniquifier;
    /// on the balance path it equals `total_price`.
    pub amount_due: Rupiah,
    pub status: PaymentStatus,
    pub source: OrderSource,
    pub voucher_code: Option<String>,
    pub discount: Rupiah,
    pub memo: Option<String>,
    /// The chat and message id of the QR code message shown to the buyer, so it can be deleted on settlement.
    pub chat_id: Option<i64>,
    pub qr_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: i64,
    pub buyer_username: Option<String>,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub total_price: Rupiah,
    pub amount_due: Rupiah,
    pub status: PaymentStatus,
    pub source: OrderSource,
    pub voucher_code: Option<String>,
    pub discount: Rupiah,
    pub memo: Option<String>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, buyer_id: i64, product: &Product, quantity: i64, total_price: Rupiah) -> Self {
        Self {
            order_id,
            buyer_id,
            buyer_username: None,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            total_price,
            amount_due: total_price,
            status: PaymentStatus::Pending,
            source: OrderSource::Bot,
            voucher_code: None,
            discount: Rupiah::from(0),
            memo: None,
        }
    }

    pub fn with_username<S: Into<String>>(mut self, username: S) -> Self {
        self.buyer_username = Some(username.into());
        self
    }

    pub fn with_memo<S: Into<String>>(mut self, memo: S) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_discount<S: Into<String>>(mut self, voucher_code: S, discount: Rupiah) -> Self {
        self.voucher_code = Some(voucher_code.into());
        self.discount = discount;
        self
    }

    pub fn with_amount_due(mut self, amount_due: Rupiah) -> Self {
        self.amount_due = amount_due;
        self
    }

    pub fn with_source(mut self, source: OrderSource) -> Self {
        self.source = source;
        self
    }
}

//--------------------------------------     TopupRequest      -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TopupRequest {
    pub id: i64,
    pub topup_id: OrderId,
    pub user_id: i64,
    pub username: Option<String>,
    /// The nominal amount credited to the balance on settlement.
    pub amount: Rupiah,
    /// The charged amount, including the uniquifier.
    pub amount_due: Rupiah,
    pub status: PaymentStatus,
    pub chat_id: Option<i64>,
    pub qr_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTopup {
    pub topup_id: OrderId,
    pub user_id: i64,
    pub username: Option<String>,
    pub amount: Rupiah,
    pub amount_due: Rupiah,
}

impl NewTopup {
    pub fn new(topup_id: OrderId, user_id: i64, amount: Rupiah) -> Self {
        Self { topup_id, user_id, username: None, amount, amount_due: amount }
    }

    pub fn with_username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_amount_due(mut self, amount_due: Rupiah) -> Self {
        self.amount_due = amount_due;
        self
    }
}

//--------------------------------------     UserBalance       -------------------------------------------------------
/// The materialized balance for a user. Invariant: `balance` always equals the sum of the user's ledger
/// entries, and is never negative.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: i64,
    pub username: Option<String>,
    pub balance: Rupiah,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      EntryType        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Topup,
    Payment,
    Refund,
}

impl Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Topup => write!(f, "topup"),
            EntryType::Payment => write!(f, "payment"),
            EntryType::Refund => write!(f, "refund"),
        }
    }
}

//--------------------------------------    BalanceEntry       -------------------------------------------------------
/// A single ledger entry. Credits are positive, debits negative.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: i64,
    pub user_id: i64,
    pub amount: Rupiah,
    pub entry_type: EntryType,
    pub description: String,
    pub order_id: Option<i64>,
    pub topup_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     DiscountType      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

//--------------------------------------       Voucher         -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Voucher {
    pub id: i64,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_purchase: Rupiah,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub is_active: bool,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Voucher {
    /// Checks the voucher against an order total without consuming a use. The authoritative check is the
    /// guarded redemption in the database; this is for quotes and early rejection.
    pub fn usable_for(&self, order_total: Rupiah) -> Result<(), VoucherError> {
        if !self.is_active {
            return Err(VoucherError::Inactive(self.code.clone()));
        }
        if self.valid_until.map(|t| t <= Utc::now()).unwrap_or(false) {
            return Err(VoucherError::Expired(self.code.clone()));
        }
        if self.max_uses.map(|m| self.used_count >= m).unwrap_or(false) {
            return Err(VoucherError::CapReached(self.code.clone()));
        }
        if self.min_purchase > order_total {
            return Err(VoucherError::MinPurchaseNotMet { code: self.code.clone(), min: self.min_purchase });
        }
        Ok(())
    }

    /// The discount this voucher grants on the given subtotal. Percentage discounts round down to a whole
    /// rupiah; fixed discounts never exceed the subtotal.
    pub fn discount_for(&self, subtotal: Rupiah) -> Rupiah {
        match self.discount_type {
            DiscountType::Percentage => Rupiah::from(subtotal.value() * self.discount_value / 100),
            DiscountType::Fixed => Rupiah::from(self.discount_value.min(subtotal.value())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVoucher {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_purchase: Rupiah,
    pub max_uses: Option<i64>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl NewVoucher {
    pub fn percentage<S: Into<String>>(code: S, percent: i64) -> Self {
        Self {
            code: code.into().to_uppercase(),
            discount_type: DiscountType::Percentage,
            discount_value: percent,
            min_purchase: Rupiah::from(0),
            max_uses: None,
            valid_until: None,
        }
    }

    pub fn fixed<S: Into<String>>(code: S, amount: Rupiah) -> Self {
        Self {
            code: code.into().to_uppercase(),
            discount_type: DiscountType::Fixed,
            discount_value: amount.value(),
            min_purchase: Rupiah::from(0),
            max_uses: None,
            valid_until: None,
        }
    }

    pub fn with_min_purchase(mut self, min: Rupiah) -> Self {
        self.min_purchase = min;
        self
    }

    pub fn with_max_uses(mut self, max_uses: i64) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    pub fn valid_until(mut self, until: DateTime<Utc>) -> Self {
        self.valid_until = Some(until);
        self
    }
}
