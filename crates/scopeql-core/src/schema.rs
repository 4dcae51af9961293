//! Schema snapshot used to ground the SQL prompt

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Table name -> ordered column names, foreign-key columns included.
///
/// Tenants share one physical shape, so a single snapshot describes every
/// tenant. Tables are kept sorted so the rendered prompt is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, Vec<String>>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a column; repeated columns keep their first position.
    pub fn insert_column(&mut self, table: &str, column: &str) {
        let columns = self.tables.entry(table.to_string()).or_default();
        if !columns.iter().any(|c| c == column) {
            columns.push(column.to_string());
        }
    }

    pub fn with_table<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tables.entry(table.to_string()).or_default();
        for column in columns {
            self.insert_column(table, column.as_ref());
        }
        self
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// One `table: col_a, col_b` line per table
    pub fn render(&self) -> String {
        self.tables
            .iter()
            .map(|(table, columns)| format!("{}: {}", table, columns.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
