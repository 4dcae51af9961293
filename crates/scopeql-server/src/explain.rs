//! Best-effort narration of query results
//!
//! Failures here never affect the query result: the attempt keeps its rows
//! and the explanation stays empty.

use scopeql_core::ResultSet;
use std::sync::Arc;
use std::time::Duration;

use crate::llm::CompletionService;
use crate::prompt::PromptBuilder;

pub struct Explainer {
    completion: Arc<dyn CompletionService>,
    prompts: PromptBuilder,
    timeout: Duration,
    max_rows: usize,
}

impl Explainer {
    pub fn new(completion: Arc<dyn CompletionService>, timeout: Duration, max_rows: usize) -> Self {
        Self {
            completion,
            prompts: PromptBuilder::default(),
            timeout,
            max_rows,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub async fn explain(&self, question: &str, sql: &str, result: &ResultSet) -> Option<String> {
        let prompt = self.prompts.explain(question, sql, result.rows(), self.max_rows);

        match tokio::time::timeout(self.timeout, self.completion.complete(&prompt)).await {
            Ok(Ok(text)) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Explanation skipped");
                None
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Explanation timed out");
                None
            }
        }
    }
}
