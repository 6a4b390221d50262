use axum::{
    extract::{Path, State},
    middleware,
    routing::get,
    Extension, Json, Router,
};
use serde_json::Value;
use emporia_enterprise::learner_ids;

use crate::error::AppError;
use crate::middleware::{customer_auth_middleware, Claims, RequestContext};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/enterprise/learner", get(learner_data))
        .route("/v1/enterprise/learner/{id}/entitlements", get(learner_entitlements))
        .route_layer(middleware::from_fn_with_state(state, customer_auth_middleware))
}

/// GET /v1/enterprise/learner
///
/// Enterprise learner records of the signed-in user, served from cache when fresh.
pub async fn learner_data(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Value>, AppError> {
    let user = claims.to_user();
    let data = state
        .enterprise
        .fetch_enterprise_learner_data(&ctx.site, &user, &ctx.switches)
        .await
        .map_err(AppError::from_enterprise)?;
    Ok(Json(data))
}

/// GET /v1/enterprise/learner/{id}/entitlements
///
/// Customers only see entitlements of their own learner records; staff see any.
pub async fn learner_entitlements(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(ctx): Extension<RequestContext>,
    Path(learner_id): Path<u64>,
) -> Result<Json<Value>, AppError> {
    if !claims.is_staff() {
        let own = state
            .enterprise
            .fetch_enterprise_learner_data(&ctx.site, &claims.to_user(), &ctx.switches)
            .await
            .map_err(AppError::from_enterprise)?;
        if !learner_ids(&own).contains(&learner_id) {
            tracing::warn!(username = %claims.username, learner_id, "Entitlements requested for another learner");
            return Err(AppError::NotFoundError(format!("Enterprise learner [{}] not found.", learner_id)));
        }
    }

    let data = state
        .enterprise
        .fetch_enterprise_learner_entitlements(&ctx.site, learner_id, &ctx.switches)
        .await
        .map_err(AppError::from_enterprise)?;
    Ok(Json(data))
}
