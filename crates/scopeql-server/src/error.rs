//! Error taxonomy of the question pipeline
//!
//! Every variant is returned as data inside a
//! [`QueryAttempt`](crate::attempt::QueryAttempt); nothing escapes the
//! pipeline as a panic.

use scopeql_core::{TenantError, ValidationError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Introspection failed before any completion call
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("Invalid tenant: {0}")]
    InvalidTenant(#[from] TenantError),

    #[error("Completion service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Completion service returned no usable output: {0}")]
    UpstreamMalformed(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    QueryExecutionFailed(String),
}

impl PipelineError {
    /// Stable snake_case code, suitable for API responses and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SchemaUnavailable(_) => "schema_unavailable",
            PipelineError::InvalidTenant(_) => "invalid_tenant",
            PipelineError::UpstreamUnavailable(_) => "upstream_unavailable",
            PipelineError::UpstreamMalformed(_) => "upstream_malformed",
            PipelineError::Validation(e) => e.kind(),
            PipelineError::QueryExecutionFailed(_) => "query_execution_failed",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }

    /// Message for the operator. Upstream failures become a "try again".
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::UpstreamUnavailable(_) | PipelineError::UpstreamMalformed(_) => {
                "The query assistant is not available right now, please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}
