//! scopeql core - the query-safety gates between an LLM and a tenant database
//!
//! Everything in this crate is synchronous and free of I/O. It defines:
//! - the schema snapshot handed to the prompt builder
//! - the tenant schema identifier
//! - the question sanitizer and SQL cleaner
//! - the SELECT-only validator, the only way to obtain a [`ValidatedSql`]
//! - the persistence contracts ([`SchemaSource`], [`ScopedExecutor`])
//! - an explicitly constructed snapshot cache

pub mod cache;
pub mod clean;
pub mod sanitize;
pub mod schema;
pub mod store;
pub mod tenant;
pub mod validate;

pub use cache::SchemaCache;
pub use clean::clean_sql;
pub use sanitize::sanitize_question;
pub use schema::SchemaSnapshot;
pub use store::{ResultSet, Row, SchemaSource, ScopedExecutor, StoreError};
pub use tenant::{TenantError, TenantSchema};
pub use validate::{validate_sql, ValidatedSql, ValidationError, FORBIDDEN_KEYWORDS};
