use axum::{
    extract::State,
    middleware,
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use emporia_core::payment::TransactionRequest;
use emporia_offer::{Basket, BasketStatus, OfferContext, OfferError, Session};
use emporia_shared::models::events::BasketFrozenEvent;

use crate::error::AppError;
use crate::middleware::{customer_auth_middleware, Claims, RequestContext};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/checkout", post(checkout))
        .route_layer(middleware::from_fn_with_state(state, customer_auth_middleware))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub basket_id: Uuid,
    pub payment_processor: String,
    /// Offer ids carried by the visitor's session.
    #[serde(default)]
    pub session: Option<Session>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub payment_form_data: serde_json::Map<String, serde_json::Value>,
    pub payment_page_url: String,
    pub payment_processor: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/checkout
pub async fn checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let result = run_checkout(&state, &claims, &ctx, req).await;
    let outcome = if result.is_ok() { "success" } else { "failure" };
    state.metrics.record_checkout(outcome);
    result.map(Json)
}

async fn run_checkout(
    state: &AppState,
    claims: &Claims,
    ctx: &RequestContext,
    req: CheckoutRequest,
) -> Result<CheckoutResponse, AppError> {
    let mut basket = state
        .baskets
        .get_basket(req.basket_id, claims.sub)
        .await
        .map_err(AppError::from_offer)?
        .ok_or_else(|| AppError::ValidationError(format!("Basket [{}] not found.", req.basket_id)))?;

    match basket.status {
        BasketStatus::Open => {
            let user = claims.to_user();
            let offer_ctx = OfferContext {
                site: &ctx.site,
                user: Some(&user),
                session: req.session.as_ref(),
                switches: &ctx.switches,
            };
            let applied = state
                .applicator
                .apply(&mut basket, &offer_ctx)
                .await
                .map_err(AppError::from_offer)?;
            for application in &applied {
                state.metrics.record_offer_applied(&application.scope.to_string());
            }

            basket.freeze().map_err(AppError::from_offer)?;
            state.baskets.save_frozen_basket(&basket).await.map_err(AppError::from_offer)?;
            tracing::info!(basket_id = %basket.id, offers = applied.len(), total = basket.total(), "Basket frozen");

            publish_frozen(state, ctx, claims, &basket, &req.payment_processor).await;
        }
        // A retried checkout keeps the prices it was frozen with.
        BasketStatus::Frozen => {
            tracing::debug!(basket_id = %basket.id, "Basket already frozen");
        }
        BasketStatus::Submitted => {
            return Err(AppError::from_offer(OfferError::InvalidBasketState {
                basket_id: basket.id,
                status: basket.status.to_string(),
            }));
        }
    }

    let processor = state
        .processors
        .get_processor_by_name(&req.payment_processor)
        .map_err(AppError::from_core)?;

    let parameters = processor
        .get_transaction_parameters(&TransactionRequest {
            basket_id: basket.id,
            order_number: basket.order_number(ctx.site.partner_code()),
            total: basket.total(),
            currency: basket.currency.clone(),
            customer_email: claims.email.clone(),
        })
        .map_err(AppError::from_core)?;

    Ok(CheckoutResponse {
        payment_form_data: parameters.form_data,
        payment_page_url: parameters.payment_page_url,
        payment_processor: processor.name().to_string(),
    })
}

async fn publish_frozen(
    state: &AppState,
    ctx: &RequestContext,
    claims: &Claims,
    basket: &Basket,
    payment_processor: &str,
) {
    let Some(kafka) = &state.kafka else {
        return;
    };

    let event = BasketFrozenEvent {
        basket_id: basket.id,
        site_domain: ctx.site.domain.clone(),
        username: claims.username.clone(),
        total_excl_discounts: basket.total_excl_discounts(),
        total: basket.total(),
        currency: basket.currency.clone(),
        applied_offer_ids: basket.applied_offer_ids(),
        payment_processor: payment_processor.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    };

    // Checkout does not depend on delivery.
    if let Err(e) = kafka.publish_basket_frozen(&event).await {
        tracing::warn!(basket_id = %basket.id, "Failed to publish basket event: {}", e);
    }
}
