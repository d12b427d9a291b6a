//! Request and query objects used by the order flow API and the admin surface.
use chrono::{DateTime, Utc};
use sbt_common::Rupiah;
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderId, OrderSource, PaymentStatus, Product, Voucher};

//--------------------------------------        Quote         --------------------------------------------------------
/// A priced snapshot of a prospective purchase. Quotes are advisory: nothing is reserved or consumed until
/// checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub product: Product,
    /// The requested quantity, clamped to `[1, available_stock]`.
    pub quantity: i64,
    pub unit_price: Rupiah,
    pub subtotal: Rupiah,
    pub discount: Rupiah,
    pub total: Rupiah,
    pub voucher: Option<Voucher>,
}

impl Quote {
    pub fn new(product: Product, quantity: i64, voucher: Option<Voucher>) -> Self {
        let unit_price = product.price;
        let subtotal = unit_price * quantity;
        let discount = voucher.as_ref().map(|v| v.discount_for(subtotal)).unwrap_or_default();
        let total = subtotal - discount;
        Self { product, quantity, unit_price, subtotal, discount, total, voucher }
    }
}

//--------------------------------------   CheckoutRequest    --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub buyer_id: i64,
    pub buyer_username: Option<String>,
    pub product_id: i64,
    pub quantity: i64,
    pub voucher_code: Option<String>,
    pub memo: Option<String>,
    #[serde(default = "default_source")]
    pub source: OrderSource,
}

fn default_source() -> OrderSource {
    OrderSource::Bot
}

impl CheckoutRequest {
    pub fn new(buyer_id: i64, product_id: i64, quantity: i64) -> Self {
        Self {
            buyer_id,
            buyer_username: None,
            product_id,
            quantity,
            voucher_code: None,
            memo: None,
            source: OrderSource::Bot,
        }
    }

    pub fn with_username<S: Into<String>>(mut self, username: S) -> Self {
        self.buyer_username = Some(username.into());
        self
    }

    pub fn with_voucher<S: Into<String>>(mut self, code: S) -> Self {
        self.voucher_code = Some(code.into());
        self
    }

    pub fn with_memo<S: Into<String>>(mut self, memo: S) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn from_web(mut self) -> Self {
        self.source = OrderSource::Web;
        self
    }
}

//--------------------------------------   OrderQueryFilter   --------------------------------------------------------
/// Search criteria for the admin order listing. Empty filters match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub buyer_id: Option<i64>,
    pub product_id: Option<i64>,
    pub memo: Option<String>,
    pub status: Option<Vec<PaymentStatus>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.buyer_id.is_none()
            && self.product_id.is_none()
            && self.memo.is_none()
            && self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true)
            && self.since.is_none()
            && self.until.is_none()
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_buyer_id(mut self, buyer_id: i64) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn with_product_id(mut self, product_id: i64) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }
}

//--------------------------------------   ProductUpdate      --------------------------------------------------------
/// A partial update to a catalogue entry. Only the supplied fields change; order snapshots are unaffected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub new_name: Option<String>,
    pub new_description: Option<String>,
    pub new_price: Option<Rupiah>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.new_name.is_none() && self.new_description.is_none() && self.new_price.is_none()
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.new_name = Some(name.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.new_description = Some(description.into());
        self
    }

    pub fn with_price(mut self, price: Rupiah) -> Self {
        self.new_price = Some(price);
        self
    }
}

//-------------------------------------- ModifyOrderRequest   --------------------------------------------------------
/// A partial update to an order, applied by an admin. Only the supplied fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModifyOrderRequest {
    pub new_status: Option<PaymentStatus>,
    pub new_memo: Option<String>,
    pub new_total_price: Option<Rupiah>,
}

impl ModifyOrderRequest {
    pub fn is_empty(&self) -> bool {
        self.new_status.is_none() && self.new_memo.is_none() && self.new_total_price.is_none()
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.new_status = Some(status);
        self
    }

    pub fn with_memo<S: Into<String>>(mut self, memo: S) -> Self {
        self.new_memo = Some(memo.into());
        self
    }

    pub fn with_total_price(mut self, price: Rupiah) -> Self {
        self.new_total_price = Some(price);
        self
    }
}
