//! Storebot Payment Engine
//!
//! The engine contains the core order-lifecycle and settlement logic for the QRIS storefront. It is
//! transport-agnostic: the Telegram bot and the HTTP webhook server are both thin clients of the APIs in
//! [`mod@sfe_api`].
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). Low-level access lives in plain functions that take a
//!    `&mut SqliteConnection`, so that callers can compose them inside transactions. You should never need to
//!    access the database directly; use the public APIs instead. The exception is the data types, which are
//!    defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@sfe_api`]). [`OrderFlowApi`] manages quotes, checkouts and order settlement,
//!    [`DepositApi`] manages the balance ledger and top-ups, and [`WebhookReconciler`] maps incoming payment
//!    notifications onto the other two.
//! 3. Events ([`mod@events`]). Settlements, annulments and stock alerts are published on a simple pub-sub
//!    channel so that delivery, chat cleanup and operator alerts can be hooked in without the engine knowing
//!    anything about chat transports.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod order_objects;
mod sfe_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use sfe_api::{DepositApi, FulfilledOrder, OrderFlowApi, Reconciliation, WebhookReconciler};
pub use traits::{
    ChargeState,
    GatewayError,
    NotificationStatus,
    OrderSettlement,
    PaymentGateway,
    PaymentNotification,
    QrisCharge,
    QrisChargeStatus,
    StorefrontDatabase,
    StorefrontError,
    TopupSettlement,
    VoucherError,
};

/// Remaining stock at or below this level triggers a [`events::LowStockEvent`] after a sale.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Payment notifications that arrive without an explicit reference are matched against pending charges by
/// amount. The charged amount carries a uniquifier of up to three digits, so two amounts within this window
/// are considered the same charge.
pub const AMOUNT_MATCH_TOLERANCE: i64 = 999;
