//! An in-memory payment gateway for tests. Charges are accepted unconditionally (unless told otherwise)
//! and their settlement state is driven by the test itself.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::Utc;
use sbt_common::Rupiah;

use crate::{
    db_types::OrderId,
    traits::{ChargeState, GatewayError, PaymentGateway, QrisCharge, QrisChargeStatus},
};

#[derive(Default)]
struct MockGatewayState {
    charges: Vec<QrisCharge>,
    statuses: HashMap<String, ChargeState>,
    next_uniquifier: i64,
    fail_next: bool,
}

#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockGatewayState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the uniquifier sequence at the given value. Each subsequent charge gets the next value, so
    /// tests can predict `amount_due` exactly.
    pub fn with_uniquifier(self, start: i64) -> Self {
        self.state.lock().unwrap().next_uniquifier = start;
        self
    }

    /// Makes the next `create_charge` call fail with a rejection.
    pub fn fail_next_charge(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    /// Drives the state the gateway will report for the given reference on the next poll.
    pub fn set_charge_state(&self, reference: &OrderId, state: ChargeState) {
        self.state.lock().unwrap().statuses.insert(reference.as_str().to_string(), state);
    }

    pub fn charge_count(&self) -> usize {
        self.state.lock().unwrap().charges.len()
    }

    pub fn last_charge(&self) -> Option<QrisCharge> {
        self.state.lock().unwrap().charges.last().cloned()
    }
}

impl PaymentGateway for MockGateway {
    async fn create_charge(
        &self,
        reference: &OrderId,
        amount: Rupiah,
        _customer_ref: &str,
    ) -> Result<QrisCharge, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next {
            state.fail_next = false;
            return Err(GatewayError::ChargeRejected("mock gateway was told to fail".to_string()));
        }
        let uniquifier = state.next_uniquifier;
        state.next_uniquifier += 1;
        let amount_due = amount + Rupiah::from(uniquifier);
        let charge = QrisCharge {
            charge_id: format!("mock-{}", state.charges.len() + 1),
            reference: reference.clone(),
            amount,
            amount_due,
            qr_content: format!("QRIS|{}|{}", reference.as_str(), amount_due.value()),
            expires_at: Some(Utc::now() + chrono::Duration::minutes(15)),
        };
        state.charges.push(charge.clone());
        state.statuses.insert(reference.as_str().to_string(), ChargeState::Pending);
        Ok(charge)
    }

    async fn charge_status(&self, reference: &OrderId) -> Result<QrisChargeStatus, GatewayError> {
        let state = self.state.lock().unwrap();
        let charge_state = state
            .statuses
            .get(reference.as_str())
            .copied()
            .ok_or_else(|| GatewayError::ChargeNotFound(reference.as_str().to_string()))?;
        let paid_at = (charge_state == ChargeState::Completed).then(Utc::now);
        Ok(QrisChargeStatus { state: charge_state, paid_at })
    }
}
