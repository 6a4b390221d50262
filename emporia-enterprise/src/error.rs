#[derive(Debug, thiserror::Error)]
pub enum EnterpriseError {
    #[error("Enterprise service unreachable: {0}")]
    Connection(String),

    #[error("Enterprise service returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Unexpected enterprise response: {0}")]
    Decode(String),

    #[error("Enterprise client misconfigured: {0}")]
    Configuration(String),

    #[error("Access token request failed: {0}")]
    Token(String),
}

impl EnterpriseError {
    /// Connection failures and error statuses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnterpriseError::Connection(_) | EnterpriseError::Status { .. })
    }
}

impl From<reqwest::Error> for EnterpriseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EnterpriseError::Decode(err.to_string())
        } else if err.is_builder() {
            EnterpriseError::Configuration(err.to_string())
        } else {
            EnterpriseError::Connection(err.to_string())
        }
    }
}
