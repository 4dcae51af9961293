//! Schema introspection through `information_schema`

use duckdb::{Connection, Result as DuckResult};
use scopeql_core::{SchemaSnapshot, StoreError};

/// Tables of every tenant schema in this database, merged into one
/// snapshot. Tenants share a shape, so the merge only dedupes.
const COLUMNS_QUERY: &str = "
    SELECT table_name, column_name
    FROM information_schema.columns
    WHERE table_catalog = current_database()
      AND table_schema NOT IN ('information_schema', 'pg_catalog', 'main')
    ORDER BY table_name, table_schema, ordinal_position
";

pub(crate) fn introspect(conn: &Connection) -> Result<SchemaSnapshot, StoreError> {
    let columns = read_columns(conn).map_err(|e| StoreError::Unavailable(e.to_string()))?;

    let mut snapshot = SchemaSnapshot::new();
    for (table, column) in &columns {
        snapshot.insert_column(table, column);
    }

    if snapshot.is_empty() {
        return Err(StoreError::Unavailable(
            "no tables found in information_schema".to_string(),
        ));
    }

    tracing::debug!(tables = snapshot.len(), columns = columns.len(), "Introspected schema");
    Ok(snapshot)
}

fn read_columns(conn: &Connection) -> DuckResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(COLUMNS_QUERY)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<DuckResult<Vec<_>>>()?;
    Ok(rows)
}
