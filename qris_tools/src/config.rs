use log::*;
use sbt_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct QrisConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub merchant_id: String,
}

impl QrisConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("SBT_QRIS_BASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ SBT_QRIS_BASE_URL not set, using the sandbox endpoint");
            "https://sandbox.qris-aggregator.example/v1".to_string()
        });
        let api_key = Secret::new(std::env::var("SBT_QRIS_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ SBT_QRIS_API_KEY not set, using (probably useless) default");
            "qris_sk_0000000000".to_string()
        }));
        let merchant_id = std::env::var("SBT_QRIS_MERCHANT_ID").unwrap_or_else(|_| {
            warn!("🪛️ SBT_QRIS_MERCHANT_ID not set, using (probably useless) default");
            "M000000".to_string()
        });
        Self { base_url, api_key, merchant_id }
    }
}
