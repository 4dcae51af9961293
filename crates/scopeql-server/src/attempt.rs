//! One question's journey through the pipeline

use chrono::{DateTime, Utc};
use scopeql_core::{ResultSet, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// Either rows (possibly empty) or an error, never both
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(ResultSet),
    Failed(PipelineError),
}

#[derive(Debug, Clone)]
pub struct QueryAttempt {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub raw_question: String,
    pub sanitized_question: String,
    pub tenant_schema: String,
    /// Cleaned model output; kept on validation and execution failures so the
    /// operator can see what was refused
    pub generated_sql: Option<String>,
    pub outcome: Outcome,
    pub explanation: Option<String>,
}

impl QueryAttempt {
    pub fn rows(&self) -> Option<&ResultSet> {
        match &self.outcome {
            Outcome::Rows(rows) => Some(rows),
            Outcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.outcome {
            Outcome::Rows(_) => None,
            Outcome::Failed(e) => Some(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Rows(_))
    }

    /// Short label for logs and the audit record
    pub fn outcome_kind(&self) -> &'static str {
        match &self.outcome {
            Outcome::Rows(_) => "ok",
            Outcome::Failed(e) => e.kind(),
        }
    }

    pub fn to_response(&self) -> QueryResponse {
        let (rows, error, error_kind) = match &self.outcome {
            Outcome::Rows(result) => (Some(result.rows().to_vec()), None, None),
            Outcome::Failed(e) => (None, Some(e.user_message()), Some(e.kind().to_string())),
        };

        QueryResponse {
            question: self.sanitized_question.clone(),
            sql: self.generated_sql.clone(),
            rows,
            explanation: self.explanation.clone(),
            error,
            error_kind,
        }
    }
}

/// Flat shape handed to callers (CLI, MCP tool). Exactly one of `rows` and
/// `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub sql: Option<String>,
    pub rows: Option<Vec<Row>>,
    pub explanation: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}
