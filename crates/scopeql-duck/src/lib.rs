//! DuckDB store for scopeql
//!
//! One database holds every tenant, one schema per tenant, all with the same
//! tables. [`DuckStore`] implements both persistence contracts:
//! - [`SchemaSource`]: reads `information_schema` into a [`SchemaSnapshot`]
//! - [`ScopedExecutor`]: runs a validated SELECT on a fresh session whose
//!   `search_path` is the tenant's schema
//!
//! The default `main` schema must stay empty. DuckDB falls back to it after
//! the search path, so the store refuses to introspect or execute while it
//! holds any table.

mod catalog;
mod value;

use duckdb::{Config, Connection};
use scopeql_core::{
    ResultSet, SchemaSnapshot, SchemaSource, ScopedExecutor, StoreError, TenantSchema,
    ValidatedSql,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

pub use value::value_to_json;

/// Limits and sandbox settings applied to the database and every statement
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Interrupt a statement that runs longer than this
    pub statement_timeout: Option<Duration>,
    /// Fail a statement that produces more rows than this
    pub max_rows: Option<usize>,
    /// DuckDB `memory_limit`, e.g. "512MB"
    pub memory_limit: Option<String>,
    /// Allow file and network access from SQL (read_csv, httpfs, ...)
    pub allow_external_access: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            statement_timeout: Some(Duration::from_secs(10)),
            max_rows: Some(10_000),
            memory_limit: None,
            allow_external_access: false,
        }
    }
}

pub struct DuckStore {
    conn: Mutex<Connection>,
    options: StoreOptions,
}

fn unavailable(e: duckdb::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn query_failed(e: duckdb::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

impl DuckStore {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self, StoreError> {
        let config = Self::config(&options)?;
        let conn = Connection::open_with_flags(path.as_ref(), config).map_err(unavailable)?;
        tracing::info!(path = %path.as_ref().display(), "Opened DuckDB store");
        Ok(Self::from_connection(conn, options))
    }

    pub fn in_memory(options: StoreOptions) -> Result<Self, StoreError> {
        let config = Self::config(&options)?;
        let conn = Connection::open_in_memory_with_flags(config).map_err(unavailable)?;
        Ok(Self::from_connection(conn, options))
    }

    pub fn from_connection(conn: Connection, options: StoreOptions) -> Self {
        Self {
            conn: Mutex::new(conn),
            options,
        }
    }

    fn config(options: &StoreOptions) -> Result<Config, StoreError> {
        let mut config = Config::default()
            .enable_external_access(options.allow_external_access)
            .map_err(unavailable)?;
        if let Some(ref limit) = options.memory_limit {
            config = config.max_memory(limit).map_err(unavailable)?;
        }
        Ok(config)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Run trusted statements (fixtures, seeding) on the base connection.
    ///
    /// Never route generated SQL through here; it skips the validator.
    pub fn execute_admin(&self, sql: &str) -> Result<(), StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
        conn.execute_batch(sql).map_err(query_failed)
    }

    /// A new session on the same database. Session settings such as
    /// `search_path` stay local to it.
    fn session(&self) -> Result<Connection, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
        conn.try_clone().map_err(unavailable)
    }

    fn bind_tenant(session: &Connection, tenant: &TenantSchema) -> Result<(), StoreError> {
        // TenantSchema only admits plain identifiers, so quoting is safe
        session
            .execute_batch(&format!("SET search_path = '{}'", tenant.as_str()))
            .map_err(|e| StoreError::Query(format!("cannot bind tenant schema {}: {}", tenant, e)))
    }

    fn fetch(&self, session: &Connection, sql: &ValidatedSql) -> Result<ResultSet, StoreError> {
        let mut stmt = session.prepare(sql.as_str()).map_err(query_failed)?;
        let mut rows = stmt.query([]).map_err(query_failed)?;

        // Taken from the executed statement, so empty results keep their columns
        let columns = rows
            .as_ref()
            .map(|statement| statement.column_names())
            .unwrap_or_default();
        let mut values: Vec<Vec<serde_json::Value>> = Vec::new();

        while let Some(row) = rows.next().map_err(query_failed)? {
            if let Some(max_rows) = self.options.max_rows {
                if values.len() >= max_rows {
                    return Err(StoreError::Query(format!(
                        "result exceeds the limit of {} rows",
                        max_rows
                    )));
                }
            }

            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                cells.push(value_to_json(row.get_ref(i).map_err(query_failed)?));
            }
            values.push(cells);
        }

        Ok(ResultSet::from_values(columns, values))
    }

    /// Run `work` while a watchdog thread interrupts `session` after the
    /// statement timeout.
    fn with_timeout<T>(
        &self,
        session: &Connection,
        work: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let Some(timeout) = self.options.statement_timeout else {
            return work();
        };

        let handle = session.interrupt_handle();
        let fired = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let watchdog = {
            let fired = Arc::clone(&fired);
            std::thread::spawn(move || {
                if let Err(mpsc::RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
                    fired.store(true, Ordering::SeqCst);
                    handle.interrupt();
                }
            })
        };

        let result = work();
        let _ = done_tx.send(());
        let _ = watchdog.join();

        settle(result, fired.load(Ordering::SeqCst), timeout)
    }

    /// Fail when the default `main` schema holds tables or views.
    ///
    /// DuckDB appends `main` to every `search_path`, so an unqualified name
    /// the tenant schema lacks would resolve there.
    fn ensure_default_schema_empty(session: &Connection) -> Result<(), StoreError> {
        let count: i64 = session
            .query_row(DEFAULT_SCHEMA_TABLES, [], |row| row.get(0))
            .map_err(unavailable)?;
        if count > 0 {
            tracing::error!(tables = count, "Default schema main is not empty, refusing to serve tenants");
            return Err(StoreError::Unavailable(format!(
                "default schema main holds {} table(s); tenant data must live in tenant schemas only",
                count
            )));
        }
        Ok(())
    }
}

const DEFAULT_SCHEMA_TABLES: &str = "
    SELECT COUNT(*)
    FROM information_schema.tables
    WHERE table_catalog = current_database()
      AND table_schema = 'main'
";

/// An interrupt only counts as a timeout when the statement actually failed;
/// a result that completed while the watchdog fired is kept.
fn settle<T>(result: Result<T, StoreError>, fired: bool, timeout: Duration) -> Result<T, StoreError> {
    match result {
        Err(_) if fired => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Statement interrupted");
            Err(StoreError::Query(format!(
                "statement exceeded the {} ms timeout",
                timeout.as_millis()
            )))
        }
        other => other,
    }
}

impl SchemaSource for DuckStore {
    fn snapshot(&self) -> Result<SchemaSnapshot, StoreError> {
        let session = self.session()?;
        Self::ensure_default_schema_empty(&session)?;
        catalog::introspect(&session)
    }
}

impl ScopedExecutor for DuckStore {
    fn execute(&self, tenant: &TenantSchema, sql: &ValidatedSql) -> Result<ResultSet, StoreError> {
        let session = self.session()?;
        Self::ensure_default_schema_empty(&session)?;
        Self::bind_tenant(&session, tenant)?;

        let started = std::time::Instant::now();
        let result = self.with_timeout(&session, || self.fetch(&session, sql));

        match &result {
            Ok(rows) => tracing::debug!(
                tenant = %tenant,
                rows = rows.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Scoped statement finished"
            ),
            Err(e) => tracing::debug!(tenant = %tenant, error = %e, "Scoped statement failed"),
        }
        result
    }
}
