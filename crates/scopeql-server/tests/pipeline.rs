//! End-to-end pipeline tests: scripted completions against a seeded DuckDB
//! database with two tenants

use async_trait::async_trait;
use scopeql_core::{
    ResultSet, SchemaCache, SchemaSnapshot, SchemaSource, ScopedExecutor, StoreError,
    TenantSchema, ValidatedSql,
};
use scopeql_duck::{DuckStore, StoreOptions};
use scopeql_server::{
    CompletionService, Explainer, MemoryAuditLog, PipelineError, QueryAttempt, Text2Sql,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const FIXTURE: &str = "
    CREATE SCHEMA acme;
    CREATE SCHEMA globex;

    CREATE TABLE acme.customer (id INTEGER, name VARCHAR, email VARCHAR, created_at TIMESTAMP);
    CREATE TABLE acme.orders (id INTEGER, customer_id INTEGER, total DECIMAL(10, 2));
    CREATE TABLE globex.customer (id INTEGER, name VARCHAR, email VARCHAR, created_at TIMESTAMP);
    CREATE TABLE globex.orders (id INTEGER, customer_id INTEGER, total DECIMAL(10, 2));

    INSERT INTO acme.customer VALUES
        (1, 'Alice', 'alice@acme.test', CAST(current_date AS TIMESTAMP)),
        (2, 'Bob', 'bob@acme.test', TIMESTAMP '2020-01-15 09:00:00');
    INSERT INTO globex.customer VALUES
        (1, 'Mallory', 'mallory@globex.test', CAST(current_date AS TIMESTAMP)),
        (2, 'Trent', 'trent@globex.test', CAST(current_date AS TIMESTAMP));
    INSERT INTO acme.orders VALUES (10, 1, 19.99);
";

const THIS_MONTH_SQL: &str = "```sql\nSELECT COUNT(*) AS count FROM acme.customer WHERE created_at >= date_trunc('month', current_date)\n```";

/// Replies in order, records every prompt
struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, PipelineError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    fn new(replies: Vec<Result<String, PipelineError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn replying(sql: &str) -> Arc<Self> {
        Self::new(vec![Ok(sql.to_string())])
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::UpstreamUnavailable("script exhausted".to_string())))
    }
}

struct StalledCompletion;

#[async_trait]
impl CompletionService for StalledCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, PipelineError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".to_string())
    }
}

struct CountingExecutor {
    inner: Arc<DuckStore>,
    calls: AtomicUsize,
}

impl ScopedExecutor for CountingExecutor {
    fn execute(&self, tenant: &TenantSchema, sql: &ValidatedSql) -> Result<ResultSet, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(tenant, sql)
    }
}

struct BrokenSchema;

impl SchemaSource for BrokenSchema {
    fn snapshot(&self) -> Result<SchemaSnapshot, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

fn seeded_store() -> Arc<DuckStore> {
    let store = DuckStore::in_memory(StoreOptions::default()).unwrap();
    store.execute_admin(FIXTURE).unwrap();
    Arc::new(store)
}

struct Harness {
    store: Arc<DuckStore>,
    executor: Arc<CountingExecutor>,
    completion: Arc<ScriptedCompletion>,
    audit: Arc<MemoryAuditLog>,
    pipeline: Text2Sql,
}

fn harness(completion: Arc<ScriptedCompletion>) -> Harness {
    let store = seeded_store();
    let executor = Arc::new(CountingExecutor {
        inner: store.clone(),
        calls: AtomicUsize::new(0),
    });
    let audit = Arc::new(MemoryAuditLog::new());
    let pipeline = Text2Sql::new(
        Arc::new(SchemaCache::new(store.clone())),
        completion.clone(),
        executor.clone(),
    )
    .with_audit(audit.clone());

    Harness {
        store,
        executor,
        completion,
        audit,
        pipeline,
    }
}

impl Harness {
    fn executions(&self) -> usize {
        self.executor.calls.load(Ordering::SeqCst)
    }
}

fn error_kind(attempt: &QueryAttempt) -> &'static str {
    attempt.error().map(PipelineError::kind).unwrap_or("ok")
}

#[tokio::test]
async fn test_counts_customers_signed_up_this_month() {
    let h = harness(ScriptedCompletion::replying(THIS_MONTH_SQL));

    let attempt = h
        .pipeline
        .process_question("How many customers signed up this month?", "acme")
        .await;

    assert!(attempt.is_success(), "{:?}", attempt.error());
    assert_eq!(attempt.sanitized_question, "How many customers signed up this month?");
    assert_eq!(
        attempt.generated_sql.as_deref(),
        Some("SELECT COUNT(*) AS count FROM acme.customer WHERE created_at >= date_trunc('month', current_date)")
    );

    let rows = attempt.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.rows()[0]["count"], json!(1));

    let prompts = h.completion.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Tenant schema: acme"));
    assert!(prompts[0].contains("customer: id, name, email, created_at"));
    assert!(prompts[0].contains("orders: id, customer_id, total"));
}

#[tokio::test]
async fn test_stacked_drop_is_rejected_and_table_survives() {
    let h = harness(ScriptedCompletion::replying(
        "SELECT * FROM acme.customer; DROP TABLE acme.customer;",
    ));

    let attempt = h.pipeline.process_question("list customers", "acme").await;

    assert_eq!(error_kind(&attempt), "forbidden_operation");
    assert!(attempt.error().unwrap().is_validation());
    assert_eq!(
        attempt.generated_sql.as_deref(),
        Some("SELECT * FROM acme.customer; DROP TABLE acme.customer;")
    );
    assert_eq!(h.executions(), 0);

    let count = scopeql_core::validate_sql("SELECT COUNT(*) AS n FROM customer").unwrap();
    let result = h
        .store
        .execute(&TenantSchema::parse("acme").unwrap(), &count)
        .unwrap();
    assert_eq!(result.rows()[0]["n"], json!(2));
}

#[tokio::test]
async fn test_placeholder_never_reaches_executor() {
    let h = harness(ScriptedCompletion::replying(
        "SELECT name FROM acme.customer WHERE id = ?",
    ));

    let attempt = h.pipeline.process_question("customer number 1", "acme").await;

    assert_eq!(error_kind(&attempt), "placeholder_detected");
    assert_eq!(h.executions(), 0);
}

#[tokio::test]
async fn test_sanitized_question_goes_into_prompt() {
    let h = harness(ScriptedCompletion::replying("SELECT name FROM acme.customer"));

    let attempt = h
        .pipeline
        .process_question("  names'; DROP TABLE customer; --  ", "acme")
        .await;

    assert_eq!(attempt.raw_question, "  names'; DROP TABLE customer; --  ");
    assert_eq!(attempt.sanitized_question, "names DROP TABLE customer --");
    assert!(h.completion.prompts()[0].contains("Question: names DROP TABLE customer --\n"));
}

#[tokio::test]
async fn test_upstream_unavailable_is_returned_as_data() {
    let h = harness(ScriptedCompletion::new(vec![Err(
        PipelineError::UpstreamUnavailable("503".to_string()),
    )]));

    let attempt = h.pipeline.process_question("list customers", "acme").await;

    assert_eq!(error_kind(&attempt), "upstream_unavailable");
    assert!(attempt.generated_sql.is_none());
    assert!(attempt.to_response().error.unwrap().contains("try again"));
    assert_eq!(h.executions(), 0);
}

#[tokio::test]
async fn test_blank_sql_is_upstream_malformed() {
    let h = harness(ScriptedCompletion::replying("```sql\n```"));

    let attempt = h.pipeline.process_question("list customers", "acme").await;

    assert_eq!(error_kind(&attempt), "upstream_malformed");
    assert_eq!(h.executions(), 0);
}

#[tokio::test]
async fn test_explainer_failure_keeps_rows() {
    let store = seeded_store();
    let completion = ScriptedCompletion::replying("SELECT name FROM acme.customer ORDER BY name");
    let pipeline = Text2Sql::new(
        Arc::new(SchemaCache::new(store.clone())),
        completion,
        store,
    )
    .with_explainer(Explainer::new(
        ScriptedCompletion::new(vec![Err(PipelineError::UpstreamUnavailable(
            "overloaded".to_string(),
        ))]),
        Duration::from_secs(5),
        50,
    ));

    let attempt = pipeline.process_question("customer names", "acme").await;

    assert!(attempt.is_success());
    assert_eq!(attempt.rows().unwrap().len(), 2);
    assert!(attempt.explanation.is_none());
}

#[tokio::test]
async fn test_explainer_timeout_keeps_rows() {
    let store = seeded_store();
    let pipeline = Text2Sql::new(
        Arc::new(SchemaCache::new(store.clone())),
        ScriptedCompletion::replying("SELECT name FROM acme.customer"),
        store,
    )
    .with_explainer(Explainer::new(
        Arc::new(StalledCompletion),
        Duration::from_millis(50),
        50,
    ));

    let attempt = pipeline.process_question("customer names", "acme").await;

    assert!(attempt.is_success());
    assert!(attempt.explanation.is_none());
}

#[tokio::test]
async fn test_explanation_is_attached() {
    let store = seeded_store();
    let explain = ScriptedCompletion::replying("  Two customers joined: Alice and Bob.\n");
    let pipeline = Text2Sql::new(
        Arc::new(SchemaCache::new(store.clone())),
        ScriptedCompletion::replying("SELECT name FROM acme.customer ORDER BY name"),
        store,
    )
    .with_explainer(Explainer::new(explain.clone(), Duration::from_secs(5), 50));

    let attempt = pipeline.process_question("customer names", "acme").await;

    assert_eq!(
        attempt.explanation.as_deref(),
        Some("Two customers joined: Alice and Bob.")
    );
    let prompt = &explain.prompts()[0];
    assert!(prompt.contains(r#"{"name":"Alice"}"#));
    assert!(prompt.contains("SQL query: SELECT name FROM acme.customer ORDER BY name"));
}

#[tokio::test]
async fn test_no_explanation_for_failures() {
    let store = seeded_store();
    let explain = ScriptedCompletion::replying("should not be asked");
    let pipeline = Text2Sql::new(
        Arc::new(SchemaCache::new(store.clone())),
        ScriptedCompletion::replying("DELETE FROM acme.customer"),
        store,
    )
    .with_explainer(Explainer::new(explain.clone(), Duration::from_secs(5), 50));

    let attempt = pipeline.process_question("remove customers", "acme").await;

    assert_eq!(error_kind(&attempt), "forbidden_operation");
    assert!(explain.prompts().is_empty());
}

#[tokio::test]
async fn test_schema_unavailable_skips_completion() {
    let store = seeded_store();
    let completion = ScriptedCompletion::replying("SELECT 1");
    let pipeline = Text2Sql::new(
        Arc::new(SchemaCache::new(Arc::new(BrokenSchema))),
        completion.clone(),
        store,
    );

    let attempt = pipeline.process_question("list customers", "acme").await;

    assert_eq!(error_kind(&attempt), "schema_unavailable");
    assert!(completion.prompts().is_empty());
}

#[tokio::test]
async fn test_invalid_tenant_skips_completion() {
    let h = harness(ScriptedCompletion::replying("SELECT 1"));

    let attempt = h
        .pipeline
        .process_question("list customers", "acme; DROP SCHEMA globex")
        .await;

    assert_eq!(error_kind(&attempt), "invalid_tenant");
    assert!(h.completion.prompts().is_empty());
    assert_eq!(h.executions(), 0);
}

#[tokio::test]
async fn test_unknown_column_is_query_execution_failed() {
    let h = harness(ScriptedCompletion::replying("SELECT nickname FROM acme.customer"));

    let attempt = h.pipeline.process_question("nicknames", "acme").await;

    assert_eq!(error_kind(&attempt), "query_execution_failed");
    assert_eq!(h.executions(), 1);
    assert!(attempt
        .to_response()
        .error
        .unwrap()
        .starts_with("Database error:"));
}

#[tokio::test]
async fn test_unqualified_sql_answers_from_requesting_tenant() {
    let sql = "SELECT name FROM customer ORDER BY name";
    let h = harness(ScriptedCompletion::new(vec![
        Ok(sql.to_string()),
        Ok(sql.to_string()),
    ]));

    let acme = h.pipeline.process_question("customer names", "acme").await;
    let globex = h.pipeline.process_question("customer names", "globex").await;

    let names = |attempt: &QueryAttempt| -> Vec<String> {
        attempt
            .rows()
            .unwrap()
            .rows()
            .iter()
            .map(|row| row["name"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(names(&acme), vec!["Alice", "Bob"]);
    assert_eq!(names(&globex), vec!["Mallory", "Trent"]);
}

#[tokio::test]
async fn test_every_attempt_is_audited() {
    let h = harness(ScriptedCompletion::new(vec![
        Ok("SELECT name FROM acme.customer".to_string()),
        Ok("DROP TABLE acme.orders".to_string()),
    ]));

    let ok = h.pipeline.process_question("names", "acme").await;
    let rejected = h.pipeline.process_question("drop orders", "acme").await;

    let entries = h.audit.entries();
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0].id, ok.id);
    assert_eq!(entries[0].tenant, "acme");
    assert!(entries[0].error_kind.is_none());
    assert_eq!(entries[0].sql_sha256.as_ref().map(String::len), Some(64));

    assert_eq!(entries[1].id, rejected.id);
    assert_eq!(entries[1].error_kind.as_deref(), Some("forbidden_operation"));
    assert_eq!(entries[1].sql.as_deref(), Some("DROP TABLE acme.orders"));
}

#[tokio::test]
async fn test_response_has_exactly_one_of_rows_or_error() {
    let replies = [
        Ok("SELECT name FROM acme.customer".to_string()),
        Ok("SELECT name FROM acme.customer WHERE name = 'nobody'".to_string()),
        Ok("UPDATE acme.customer SET name = 'x'".to_string()),
        Ok("SELECT * FROM acme.customer WHERE id = :id".to_string()),
        Ok("SELECT 1; SELECT 2".to_string()),
        Ok("WITH c AS (SELECT 1) SELECT * FROM c".to_string()),
        Ok("SELECT missing FROM acme.customer".to_string()),
        Err(PipelineError::UpstreamMalformed("empty".to_string())),
    ];
    let expected = [
        "ok",
        "ok",
        "forbidden_operation",
        "placeholder_detected",
        "multiple_statements",
        "not_a_select",
        "query_execution_failed",
        "upstream_malformed",
    ];

    let h = harness(ScriptedCompletion::new(replies.into_iter().collect()));

    for kind in expected {
        let attempt = h.pipeline.process_question("anything", "acme").await;
        assert_eq!(error_kind(&attempt), kind);

        let response = attempt.to_response();
        assert!(response.rows.is_some() != response.error.is_some());
        assert_eq!(response.error_kind.is_some(), response.error.is_some());
    }
}

#[tokio::test]
async fn test_schema_info_and_invalidation() {
    let h = harness(ScriptedCompletion::new(vec![]));

    let info = h.pipeline.schema_info().await.unwrap();
    assert_eq!(info.total_tables, 2);
    assert_eq!(info.tables, vec!["customer", "orders"]);
    assert!(info.cached);
    assert_eq!(info.cache_version, 0);

    h.store
        .execute_admin("CREATE TABLE acme.product (id INTEGER, title VARCHAR)")
        .unwrap();
    assert_eq!(h.pipeline.schema_info().await.unwrap().total_tables, 2);

    assert_eq!(h.pipeline.invalidate_schema(), 1);
    let info = h.pipeline.schema_info().await.unwrap();
    assert_eq!(info.tables, vec!["customer", "orders", "product"]);
}
