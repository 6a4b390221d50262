pub mod payment;
pub mod repository;
pub mod switches;

pub use switches::FeatureSwitches;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
    #[error("Payment processor [{0}] not found.")]
    ProcessorNotFound(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
