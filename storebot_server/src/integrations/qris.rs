//! Bridges the QRIS aggregator client into the engine's payment gateway contract.
use qris_tools::{ChargeLifecycle, QrisApi, QrisApiError, QrisConfig};
use sbt_common::Rupiah;
use storebot_engine::{
    db_types::OrderId,
    ChargeState,
    GatewayError,
    PaymentGateway,
    QrisCharge,
    QrisChargeStatus,
};

#[derive(Clone)]
pub struct QrisGateway {
    api: QrisApi,
}

impl QrisGateway {
    pub fn new(api: QrisApi) -> Self {
        Self { api }
    }

    pub fn from_config(config: QrisConfig) -> Result<Self, GatewayError> {
        let api = QrisApi::new(config).map_err(gateway_err)?;
        Ok(Self { api })
    }
}

impl PaymentGateway for QrisGateway {
    async fn create_charge(
        &self,
        reference: &OrderId,
        amount: Rupiah,
        customer_ref: &str,
    ) -> Result<QrisCharge, GatewayError> {
        let charge = self.api.create_charge(reference.as_str(), amount, customer_ref).await.map_err(gateway_err)?;
        Ok(QrisCharge {
            charge_id: charge.id,
            reference: reference.clone(),
            amount: charge.amount,
            amount_due: charge.amount_due,
            qr_content: charge.qr_string,
            expires_at: charge.expires_at,
        })
    }

    async fn charge_status(&self, reference: &OrderId) -> Result<QrisChargeStatus, GatewayError> {
        let charge = self.api.get_charge(reference.as_str()).await.map_err(gateway_err)?;
        let state = match charge.status {
            ChargeLifecycle::Pending => ChargeState::Pending,
            ChargeLifecycle::Completed => ChargeState::Completed,
            ChargeLifecycle::Expired => ChargeState::Expired,
            ChargeLifecycle::Cancelled => ChargeState::Cancelled,
        };
        Ok(QrisChargeStatus { state, paid_at: charge.paid_at })
    }
}

fn gateway_err(e: QrisApiError) -> GatewayError {
    match e {
        QrisApiError::Initialization(m) => GatewayError::Initialization(m),
        QrisApiError::ChargeNotFound(m) => GatewayError::ChargeNotFound(m),
        QrisApiError::QueryError { status, message } if (400..500).contains(&status) => {
            GatewayError::ChargeRejected(format!("{status}: {message}"))
        },
        e => GatewayError::RequestFailed(e.to_string()),
    }
}
