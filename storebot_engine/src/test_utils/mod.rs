//! Helpers for integration tests: database setup and an in-memory payment gateway.
mod mock_gateway;
mod prepare_env;

pub use mock_gateway::MockGateway;
pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations};
