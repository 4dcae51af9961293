//! Prompt templates for SQL generation and result explanation

use scopeql_core::{Row, SchemaSnapshot, TenantSchema};

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    dialect: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("DuckDB")
    }
}

impl PromptBuilder {
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
        }
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Instruction asking for one schema-qualified SELECT over the snapshot
    pub fn build(&self, question: &str, schema: &SchemaSnapshot, tenant: &TenantSchema) -> String {
        let dialect = &self.dialect;
        format!(
            r#"You are a {dialect} SQL expert. Generate a single {dialect} SELECT query for one tenant schema.
Use ONLY the tables and columns listed under Schema, spelled exactly as listed. Do NOT invent table or column names.
Do not add prefixes like 'tenant_' unless they exist in the schema.
Return only the SQL statement, without markdown, placeholders or variables.

Rules:
1. Use only the tables and columns in the schema.
2. Fully qualify every table with the tenant schema: {tenant}.<table>.
3. Use ILIKE for text comparisons.
4. Return exactly one SELECT query. No multiple statements.
5. Prefer human-readable columns (names, emails, titles) over raw IDs.
6. Do NOT use placeholders like ? or :variable. Use literal values or column names.
7. Do NOT use extensions or custom syntax.
8. Foreign keys are named <referenced_table>_id. To join orders to customer, use {tenant}.orders.customer_id = {tenant}.customer.id.

Tenant schema: {tenant}
Schema:
{schema}
Question: {question}
SQL Query:"#,
            dialect = dialect,
            tenant = tenant,
            schema = schema.render(),
            question = question,
        )
    }

    /// Instruction asking for a plain-language narration of `rows`.
    /// At most `max_rows` rows are included.
    pub fn explain(&self, question: &str, sql: &str, rows: &[Row], max_rows: usize) -> String {
        let results = if rows.is_empty() {
            "No results found".to_string()
        } else {
            let mut lines: Vec<String> = rows
                .iter()
                .take(max_rows)
                .map(|row| serde_json::Value::Object(row.clone()).to_string())
                .collect();
            if rows.len() > max_rows {
                lines.push(format!("... and {} more rows", rows.len() - max_rows));
            }
            lines.join("\n")
        };

        format!(
            r#"You are an assistant explaining database results to a shop operator.
Explain the results below in plain, presentation-ready language.
Do not use SQL or database terms; someone without technical knowledge must understand it.

Original question: {question}
SQL query: {sql}
Results ({count} rows):
{results}
Explanation:"#,
            question = question,
            sql = sql,
            count = rows.len(),
            results = results,
        )
    }
}
