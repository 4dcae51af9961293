//! Contracts of the persistence layer
//!
//! The pipeline never talks to a database directly. It asks a
//! [`SchemaSource`] for the snapshot and hands a [`ValidatedSql`] to a
//! [`ScopedExecutor`], which must bind its own session to the tenant schema.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::SchemaSnapshot;
use crate::tenant::TenantSchema;
use crate::validate::ValidatedSql;

/// One result row: column name -> value
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Storage could not be reached or introspected
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The statement itself failed (unknown column, type error, timeout, ...)
    #[error("Query failed: {0}")]
    Query(String),
}

impl StoreError {
    /// The underlying message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            StoreError::Unavailable(message) | StoreError::Query(message) => message,
        }
    }
}

/// Rows of one statement; every row carries exactly `columns`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl ResultSet {
    /// Build from positional values. Short rows are padded with `null`,
    /// extra values are dropped, so the column set is uniform.
    pub fn from_values(columns: Vec<String>, values: Vec<Vec<Value>>) -> Self {
        let rows = values
            .into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                columns
                    .iter()
                    .map(|column| (column.clone(), cells.next().unwrap_or(Value::Null)))
                    .collect::<Row>()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Enumerates the tables and columns available for query generation.
pub trait SchemaSource: Send + Sync {
    fn snapshot(&self) -> Result<SchemaSnapshot, StoreError>;
}

/// Runs one validated SELECT inside a session bound to `tenant`.
///
/// Implementations must set the tenant scope on a per-request session,
/// never on a connection shared with other requests.
pub trait ScopedExecutor: Send + Sync {
    fn execute(&self, tenant: &TenantSchema, sql: &ValidatedSql) -> Result<ResultSet, StoreError>;
}
