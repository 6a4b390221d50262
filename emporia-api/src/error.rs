use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use emporia_catalog::CatalogError;
use emporia_core::CoreError;
use emporia_enterprise::EnterpriseError;
use emporia_offer::OfferError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    /// The remote enterprise service failed or was unreachable.
    UpstreamError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn from_catalog(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => AppError::NotFoundError(format!("Course [{}] not found.", id)),
            CatalogError::InvalidQuery(msg) => AppError::ValidationError(msg),
            CatalogError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }

    pub fn from_offer(err: OfferError) -> Self {
        match err {
            OfferError::InvalidBasketState { .. } => AppError::ConflictError(err.to_string()),
            OfferError::Enterprise(msg) => AppError::UpstreamError(msg),
            OfferError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }

    pub fn from_core(err: CoreError) -> Self {
        match err {
            CoreError::ProcessorNotFound(_) | CoreError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
            CoreError::InternalError(msg) => AppError::InternalServerError(msg),
        }
    }

    pub fn from_enterprise(err: EnterpriseError) -> Self {
        match err {
            EnterpriseError::Configuration(msg) => AppError::InternalServerError(msg),
            other => AppError::UpstreamError(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamError(msg) => {
                tracing::warn!("Enterprise service error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Enterprise service unavailable".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
