//! scopeql server - natural language questions answered inside one tenant schema
//!
//! The pipeline turns a question into one validated SELECT with an
//! OpenAI-compatible completion service and runs it on the tenant's DuckDB
//! schema. Surfaces: the `scopeql` CLI and an MCP server.

pub mod attempt;
pub mod audit;
pub mod config;
pub mod error;
pub mod explain;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod pipeline;
pub mod prompt;

pub use attempt::{Outcome, QueryAttempt, QueryResponse};
pub use audit::{AuditEntry, AuditError, AuditSink, JsonlAuditLog, MemoryAuditLog, NoopAuditLog};
pub use config::{Config, ConfigError};
pub use error::PipelineError;
pub use explain::Explainer;
pub use llm::{CompletionService, OpenAiCompletion};
pub use pipeline::{SchemaInfo, Text2Sql};
pub use prompt::PromptBuilder;
