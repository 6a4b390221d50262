use std::collections::HashMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::{CoreError, CoreResult};

/// What a processor needs to know about a frozen basket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub basket_id: Uuid,
    pub order_number: String,
    pub total: i64,
    pub currency: String,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionParameters {
    pub payment_page_url: String,
    pub form_data: serde_json::Map<String, serde_json::Value>,
}

/// Builds the parameters a client posts to the processor's payment page.
pub trait PaymentProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn get_transaction_parameters(
        &self,
        request: &TransactionRequest,
    ) -> CoreResult<TransactionParameters>;
}

/// Processor that redirects to a hosted payment page.
pub struct HostedPageProcessor {
    name: String,
    payment_page_url: String,
    merchant_id: String,
}

impl HostedPageProcessor {
    pub fn new(name: &str, payment_page_url: &str, merchant_id: &str) -> Self {
        Self {
            name: name.to_string(),
            payment_page_url: payment_page_url.to_string(),
            merchant_id: merchant_id.to_string(),
        }
    }
}

impl PaymentProcessor for HostedPageProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_transaction_parameters(
        &self,
        request: &TransactionRequest,
    ) -> CoreResult<TransactionParameters> {
        if request.total < 0 {
            return Err(CoreError::ValidationError(format!(
                "Basket [{}] has a negative total",
                request.basket_id
            )));
        }

        let mut form_data = serde_json::Map::new();
        form_data.insert("merchant_id".into(), serde_json::json!(self.merchant_id));
        form_data.insert("reference_number".into(), serde_json::json!(request.order_number));
        form_data.insert("amount".into(), serde_json::json!(format_amount(request.total)));
        form_data.insert("currency".into(), serde_json::json!(request.currency));
        if let Some(email) = &request.customer_email {
            form_data.insert("bill_to_email".into(), serde_json::json!(email));
        }

        Ok(TransactionParameters {
            payment_page_url: self.payment_page_url.clone(),
            form_data,
        })
    }
}

/// Minor units to a two-decimal string, e.g. 4999 -> "49.99".
pub fn format_amount(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Processors registered at startup, looked up by name per checkout.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn PaymentProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, processor: Arc<dyn PaymentProcessor>) {
        self.processors.insert(processor.name().to_string(), processor);
    }

    pub fn get_processor_by_name(&self, name: &str) -> CoreResult<Arc<dyn PaymentProcessor>> {
        self.processors
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::ProcessorNotFound(name.to_string()))
    }
}
