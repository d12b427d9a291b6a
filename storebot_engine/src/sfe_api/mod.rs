//! The engine's public API surface. [`OrderFlowApi`] owns the purchase lifecycle, [`DepositApi`] owns the
//! balance ledger, and [`WebhookReconciler`] maps payment notifications onto the other two.
mod deposit_api;
mod order_flow_api;
mod reconciler;

pub use deposit_api::DepositApi;
pub use order_flow_api::{FulfilledOrder, OrderFlowApi};
pub use reconciler::{Reconciliation, WebhookReconciler};
