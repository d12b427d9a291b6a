use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    StatusCode,
};
use sbt_common::Rupiah;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    config::QrisConfig,
    data_objects::{ChargeResource, NewCharge},
    QrisApiError,
};

/// A thin client for the QRIS aggregator's REST API.
#[derive(Clone)]
pub struct QrisApi {
    config: QrisConfig,
    client: Arc<Client>,
}

impl QrisApi {
    pub fn new(config: QrisConfig) -> Result<Self, QrisApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| QrisApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| QrisApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, QrisApiError> {
        let url = self.url(path);
        trace!("📱️ Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| QrisApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("📱️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| QrisApiError::JsonError(e.to_string()))
        } else {
            let status = response.status();
            let message = response.text().await.map_err(|e| QrisApiError::RestResponseError(e.to_string()))?;
            if status == StatusCode::NOT_FOUND {
                return Err(QrisApiError::ChargeNotFound(message));
            }
            Err(QrisApiError::QueryError { status: status.as_u16(), message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Creates a new charge. The provider adds the amount uniquifier; read `amount_due` off the result.
    pub async fn create_charge(
        &self,
        reference: &str,
        amount: Rupiah,
        customer_ref: &str,
    ) -> Result<ChargeResource, QrisApiError> {
        #[derive(Deserialize)]
        struct ChargeResponse {
            charge: ChargeResource,
        }
        let body = NewCharge {
            reference: reference.to_string(),
            merchant_id: self.config.merchant_id.clone(),
            amount,
            customer_ref: customer_ref.to_string(),
        };
        debug!("📱️ Creating charge for {reference}: {amount}");
        let result = self.rest_query::<ChargeResponse, NewCharge>(Method::POST, "/charges", &[], Some(body)).await?;
        info!("📱️ Charge {} created for {reference}. {} due", result.charge.id, result.charge.amount_due);
        Ok(result.charge)
    }

    pub async fn get_charge(&self, reference: &str) -> Result<ChargeResource, QrisApiError> {
        #[derive(Deserialize)]
        struct ChargeResponse {
            charge: ChargeResource,
        }
        let path = format!("/charges/{reference}");
        let result = self.rest_query::<ChargeResponse, ()>(Method::GET, &path, &[], None).await?;
        Ok(result.charge)
    }

    pub async fn cancel_charge(&self, reference: &str) -> Result<ChargeResource, QrisApiError> {
        #[derive(Deserialize)]
        struct ChargeResponse {
            charge: ChargeResource,
        }
        let path = format!("/charges/{reference}/cancel");
        debug!("📱️ Cancelling charge {reference}");
        let result = self.rest_query::<ChargeResponse, ()>(Method::POST, &path, &[], None).await?;
        info!("📱️ Charge {reference} cancelled");
        Ok(result.charge)
    }

    pub async fn list_pending_charges(&self) -> Result<Vec<ChargeResource>, QrisApiError> {
        #[derive(Deserialize)]
        struct ChargesResponse {
            charges: Vec<ChargeResource>,
        }
        let result =
            self.rest_query::<ChargesResponse, ()>(Method::GET, "/charges", &[("status", "pending")], None).await?;
        Ok(result.charges)
    }
}
