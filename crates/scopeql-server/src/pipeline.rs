//! Question pipeline
//!
//! sanitize → tenant → snapshot → prompt → complete → clean → validate →
//! execute → explain → audit
//!
//! Every failure ends up as data in the returned [`QueryAttempt`].

use anyhow::Context;
use chrono::Utc;
use scopeql_core::{
    clean_sql, sanitize_question, validate_sql, ResultSet, SchemaCache, SchemaSnapshot,
    ScopedExecutor, TenantSchema,
};
use scopeql_duck::DuckStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::attempt::{Outcome, QueryAttempt};
use crate::audit::{AuditEntry, AuditSink, JsonlAuditLog, NoopAuditLog};
use crate::config::Config;
use crate::error::PipelineError;
use crate::explain::Explainer;
use crate::llm::{CompletionService, OpenAiCompletion};
use crate::prompt::PromptBuilder;

/// Summary of the current schema snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SchemaInfo {
    pub total_tables: usize,
    pub tables: Vec<String>,
    pub cache_version: u64,
    pub cached: bool,
    pub schema: SchemaSnapshot,
}

pub struct Text2Sql {
    schema: Arc<SchemaCache>,
    completion: Arc<dyn CompletionService>,
    executor: Arc<dyn ScopedExecutor>,
    audit: Arc<dyn AuditSink>,
    prompts: PromptBuilder,
    explainer: Option<Explainer>,
}

impl Text2Sql {
    pub fn new(
        schema: Arc<SchemaCache>,
        completion: Arc<dyn CompletionService>,
        executor: Arc<dyn ScopedExecutor>,
    ) -> Self {
        Self {
            schema,
            completion,
            executor,
            audit: Arc::new(NoopAuditLog),
            prompts: PromptBuilder::default(),
            explainer: None,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_explainer(mut self, explainer: Explainer) -> Self {
        self.explainer = Some(explainer);
        self
    }

    /// Wire the production collaborators: the DuckDB store for both schema
    /// and execution, the OpenAI-compatible client for both completions.
    pub fn from_config(config: &Config, store: Arc<DuckStore>, api_key: &str) -> anyhow::Result<Self> {
        let schema = if config.schema_cache.enabled {
            SchemaCache::new(store.clone())
        } else {
            SchemaCache::uncached(store.clone())
        };
        let completion: Arc<dyn CompletionService> =
            Arc::new(OpenAiCompletion::new(api_key, &config.llm));
        let prompts = PromptBuilder::new(config.database.dialect.clone());

        let mut pipeline = Self::new(Arc::new(schema), completion.clone(), store)
            .with_prompts(prompts.clone());

        if config.explain.enabled {
            pipeline = pipeline.with_explainer(
                Explainer::new(
                    completion,
                    Duration::from_secs(config.explain.timeout_secs),
                    config.explain.max_rows,
                )
                .with_prompts(prompts),
            );
        }

        if let Some(path) = &config.audit.path {
            let log = JsonlAuditLog::new(path)
                .with_context(|| format!("Failed to open audit log {}", path))?;
            tracing::info!(path = %path, "Audit log enabled");
            pipeline = pipeline.with_audit(Arc::new(log));
        }

        Ok(pipeline)
    }

    /// Answer one question for one tenant
    pub async fn process_question(&self, raw_question: &str, tenant_schema: &str) -> QueryAttempt {
        let mut attempt = QueryAttempt {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            raw_question: raw_question.to_string(),
            sanitized_question: sanitize_question(raw_question),
            tenant_schema: tenant_schema.to_string(),
            generated_sql: None,
            outcome: Outcome::Rows(ResultSet::empty()),
            explanation: None,
        };

        tracing::info!(
            attempt_id = %attempt.id,
            tenant = %tenant_schema,
            question = %attempt.sanitized_question,
            "Processing question"
        );

        attempt.outcome = match self.run(&mut attempt).await {
            Ok(rows) => Outcome::Rows(rows),
            Err(e) => Outcome::Failed(e),
        };

        if let (Some(explainer), Outcome::Rows(rows), Some(sql)) =
            (&self.explainer, &attempt.outcome, &attempt.generated_sql)
        {
            attempt.explanation = explainer
                .explain(&attempt.sanitized_question, sql, rows)
                .await;
        }

        self.record(&attempt);
        attempt
    }

    async fn run(&self, attempt: &mut QueryAttempt) -> Result<ResultSet, PipelineError> {
        let tenant = TenantSchema::parse(&attempt.tenant_schema)?;

        let snapshot = self.load_snapshot().await?;

        let prompt = self
            .prompts
            .build(&attempt.sanitized_question, &snapshot, &tenant);
        let completion = self.completion.complete(&prompt).await?;

        let cleaned = clean_sql(&completion);
        if cleaned.is_empty() {
            return Err(PipelineError::UpstreamMalformed(
                "completion contained no SQL".to_string(),
            ));
        }
        attempt.generated_sql = Some(cleaned.clone());
        tracing::debug!(attempt_id = %attempt.id, sql = %cleaned, "Generated SQL");

        let validated = validate_sql(&cleaned).map_err(|e| {
            tracing::warn!(
                attempt_id = %attempt.id,
                tenant = %tenant,
                kind = e.kind(),
                sql = %cleaned,
                "Generated SQL rejected"
            );
            PipelineError::from(e)
        })?;

        let executor = Arc::clone(&self.executor);
        tokio::task::spawn_blocking(move || executor.execute(&tenant, &validated))
            .await
            .map_err(|e| PipelineError::QueryExecutionFailed(e.to_string()))?
            .map_err(|e| PipelineError::QueryExecutionFailed(e.message().to_string()))
    }

    fn record(&self, attempt: &QueryAttempt) {
        crate::log_event!(
            level: tracing::Level::INFO,
            event: "query_attempt",
            attempt_id: attempt.id,
            tenant: attempt.tenant_schema,
            sql: attempt.generated_sql,
            outcome: attempt.outcome_kind(),
            rows: attempt.rows().map(ResultSet::len)
        );

        if let Err(e) = self.audit.record(&AuditEntry::from_attempt(attempt)) {
            tracing::error!(attempt_id = %attempt.id, error = %e, "Failed to record audit entry");
        }
    }

    /// Introspection may hit the database, so it runs on the blocking pool
    async fn load_snapshot(&self) -> Result<Arc<SchemaSnapshot>, PipelineError> {
        let schema = Arc::clone(&self.schema);
        tokio::task::spawn_blocking(move || schema.snapshot())
            .await
            .map_err(|e| PipelineError::SchemaUnavailable(e.to_string()))?
            .map_err(|e| PipelineError::SchemaUnavailable(e.message().to_string()))
    }

    pub async fn schema_info(&self) -> Result<SchemaInfo, PipelineError> {
        let snapshot = self.load_snapshot().await?;

        Ok(SchemaInfo {
            total_tables: snapshot.len(),
            tables: snapshot.tables().map(str::to_string).collect(),
            cache_version: self.schema.version(),
            cached: self.schema.is_enabled(),
            schema: (*snapshot).clone(),
        })
    }

    /// Force the next question to re-introspect (after migrations)
    pub fn invalidate_schema(&self) -> u64 {
        self.schema.invalidate()
    }
}
