//! Interface contracts of the engine.
//!
//! [`StorefrontDatabase`] is the contract a persistence backend must implement. Every mutation that must be
//! atomic (settlement, allocation, debits, voucher redemption) is part of the backend contract, expressed as
//! conditional statements or transactions inside the backend. The API layer never does read-then-write for
//! these.
//!
//! [`PaymentGateway`] is the contract for the QRIS payment provider. The engine treats the provider as a
//! black box: it creates charges, reports their status, and pushes notifications that the
//! [`crate::WebhookReconciler`] maps back onto orders and top-ups.
mod data_objects;
mod payment_gateway;
mod storefront_database;

pub use data_objects::{NotificationStatus, OrderSettlement, PaymentNotification, TopupSettlement};
pub use payment_gateway::{ChargeState, GatewayError, PaymentGateway, QrisCharge, QrisChargeStatus};
pub use storefront_database::{StorefrontDatabase, StorefrontError, VoucherError};
