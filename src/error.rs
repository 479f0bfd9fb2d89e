//! Error types for the freight marketplace core.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Rule violation with a reason meant to be shown to the user unchanged.
    #[error("{0}")]
    BusinessRule(String),

    #[error("invalid input: {0}")]
    Validation(String),

    /// Routing service failure. Recovered locally, never returned to callers
    /// of the public operations.
    #[error("routing service unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl MarketError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MarketError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        MarketError::UpstreamUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
