//! A client for the QRIS payment aggregator's REST API.
//!
//! The aggregator issues dynamic QRIS charges, uniquifies the charged amount so bank notifications can be
//! matched back to a charge, and reports settlement over webhooks or polling.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::QrisApi;
pub use config::QrisConfig;
pub use data_objects::{ChargeLifecycle, ChargeResource, NewCharge};
pub use error::QrisApiError;
