use std::env;

use chrono::Duration;
use log::*;
use qris_tools::QrisConfig;

const DEFAULT_SBT_HOST: &str = "127.0.0.1";
const DEFAULT_SBT_PORT: u16 = 8360;
/// How long a pending charge stays payable before the sweeper expires it.
const DEFAULT_PENDING_TTL_MINUTES: i64 = 15;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The time before a pending order or top-up is considered abandoned and marked as expired.
    pub pending_ttl: Duration,
    /// How often the expiry sweeper runs.
    pub sweep_interval_secs: u64,
    /// QRIS payment provider configuration.
    pub qris_config: QrisConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SBT_HOST.to_string(),
            port: DEFAULT_SBT_PORT,
            database_url: String::default(),
            pending_ttl: Duration::minutes(DEFAULT_PENDING_TTL_MINUTES),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            qris_config: QrisConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SBT_HOST").ok().unwrap_or_else(|| DEFAULT_SBT_HOST.into());
        let port = env::var("SBT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SBT_PORT. {e} Using the default, {DEFAULT_SBT_PORT}, instead."
                    );
                    DEFAULT_SBT_PORT
                })
            })
            .unwrap_or(DEFAULT_SBT_PORT);
        let database_url = env::var("SBT_DATABASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ SBT_DATABASE_URL is not set. Using the default sqlite database.");
            "sqlite://data/storebot.db".to_string()
        });
        let pending_ttl = env::var("SBT_PENDING_TTL_MINUTES")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| {
                        error!("🪛️ {s} is not a valid value for SBT_PENDING_TTL_MINUTES. {e} Using the default.");
                        e
                    })
                    .ok()
            })
            .unwrap_or(DEFAULT_PENDING_TTL_MINUTES);
        let pending_ttl = Duration::minutes(pending_ttl);
        let sweep_interval_secs = env::var("SBT_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| {
                        error!("🪛️ {s} is not a valid value for SBT_SWEEP_INTERVAL_SECS. {e} Using the default.");
                        e
                    })
                    .ok()
            })
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        let qris_config = QrisConfig::new_from_env_or_default();
        info!("🪛️ Pending charges expire after {} minutes; the sweeper runs every {sweep_interval_secs}s", pending_ttl.num_minutes());
        Self { host, port, database_url, pending_ttl, sweep_interval_secs, qris_config }
    }
}
