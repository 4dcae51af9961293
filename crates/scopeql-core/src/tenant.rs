//! Tenant schema identifier

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest identifier accepted (PostgreSQL's NAMEDATALEN - 1)
pub const MAX_TENANT_SCHEMA_LEN: usize = 63;

const RESERVED_SCHEMAS: [&str; 4] = ["information_schema", "pg_catalog", "temp", "system"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantError {
    #[error("Tenant schema name is empty")]
    Empty,

    #[error("Tenant schema name exceeds 63 bytes: {0}")]
    TooLong(String),

    #[error("Tenant schema name is not a plain identifier: {0}")]
    NotAnIdentifier(String),

    #[error("Tenant schema name is reserved: {0}")]
    Reserved(String),
}

/// A tenant's schema name, checked to be a plain SQL identifier.
///
/// The executor interpolates it into `SET search_path`, so only
/// `[A-Za-z_][A-Za-z0-9_]*` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantSchema(String);

impl TenantSchema {
    pub fn parse(name: &str) -> Result<Self, TenantError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TenantError::Empty);
        }
        if name.len() > MAX_TENANT_SCHEMA_LEN {
            return Err(TenantError::TooLong(name.to_string()));
        }

        let mut chars = name.chars();
        let head_ok = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(TenantError::NotAnIdentifier(name.to_string()));
        }

        if RESERVED_SCHEMAS.contains(&name.to_ascii_lowercase().as_str()) {
            return Err(TenantError::Reserved(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TenantSchema {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for TenantSchema {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
