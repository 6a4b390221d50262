use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use crate::error::AppError;
use crate::state::AppState;

/// Service counters, kept in a registry owned by the app state.
pub struct ApiMetrics {
    registry: Registry,
    pub checkouts_total: IntCounterVec,
    pub offers_applied_total: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let checkouts_total = IntCounterVec::new(
            Opts::new("emporia_checkouts_total", "Checkout attempts by outcome"),
            &["outcome"],
        )?;
        let offers_applied_total = IntCounterVec::new(
            Opts::new("emporia_offers_applied_total", "Offers applied to baskets by scope"),
            &["scope"],
        )?;

        registry.register(Box::new(checkouts_total.clone()))?;
        registry.register(Box::new(offers_applied_total.clone()))?;

        Ok(Self { registry, checkouts_total, offers_applied_total })
    }

    pub fn record_checkout(&self, outcome: &str) {
        self.checkouts_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_offer_applied(&self, scope: &str) {
        self.offers_applied_total.with_label_values(&[scope]).inc();
    }

    pub fn render(&self) -> Result<String, AppError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| AppError::InternalServerError(format!("Metrics encoding failed: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| AppError::InternalServerError(format!("Metrics encoding failed: {}", e)))
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
