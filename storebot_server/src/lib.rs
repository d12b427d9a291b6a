//! Storebot Payment Server
//!
//! The HTTP face of the storefront engine. It exposes the QRIS webhook, the catalogue and order admin
//! endpoints, and runs the background sweeper that expires abandoned charges. All business logic lives in
//! `storebot_engine`; this crate is routing, configuration and glue.
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
