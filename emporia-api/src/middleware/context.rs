use axum::{
    extract::{Request, State},
    http::{header::HOST, StatusCode},
    middleware::Next,
    response::Response,
};
use emporia_core::FeatureSwitches;
use emporia_shared::Site;

use crate::state::AppState;

/// Site and switch state resolved once for the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub site: Site,
    pub switches: FeatureSwitches,
}

pub async fn resolve_switches(state: &AppState) -> FeatureSwitches {
    match state.switch_repo.load_switches().await {
        Ok(stored) => state.switch_defaults.clone().merged(&stored),
        Err(e) => {
            tracing::warn!("Switch store unavailable, using configured defaults: {}", e);
            state.switch_defaults.clone()
        }
    }
}

pub async fn request_context_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let host = req.headers().get(HOST).and_then(|h| h.to_str().ok());
    let site = state
        .sites
        .resolve(host)
        .cloned()
        .ok_or_else(|| {
            tracing::error!("No sites configured");
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    let switches = resolve_switches(&state).await;
    req.extensions_mut().insert(RequestContext { site, switches });
    Ok(next.run(req).await)
}
