//! Append-only audit trail of answered questions
//!
//! The pipeline writes, nothing here is ever read back by it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::attempt::QueryAttempt;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to write audit log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize audit entry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Audit log lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tenant: String,
    pub question: String,
    pub sql: Option<String>,
    pub explanation: Option<String>,
    /// `None` when the question was answered
    pub error_kind: Option<String>,
    /// Fingerprint for grouping repeated generations of the same SQL
    pub sql_sha256: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_attempt(attempt: &QueryAttempt) -> Self {
        Self {
            id: attempt.id,
            tenant: attempt.tenant_schema.clone(),
            question: attempt.sanitized_question.clone(),
            sql: attempt.generated_sql.clone(),
            explanation: attempt.explanation.clone(),
            error_kind: attempt.error().map(|e| e.kind().to_string()),
            sql_sha256: attempt.generated_sql.as_deref().map(sql_fingerprint),
            recorded_at: Utc::now(),
        }
    }
}

pub fn sql_fingerprint(sql: &str) -> String {
    format!("{:x}", Sha256::digest(sql.trim().as_bytes()))
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// One JSON object per line, appended
pub struct JsonlAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, AuditError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().map_err(|_| AuditError::Poisoned)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Keeps entries in memory; for tests and embedding
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .map_err(|_| AuditError::Poisoned)?
            .push(entry.clone());
        Ok(())
    }
}

pub struct NoopAuditLog;

impl AuditSink for NoopAuditLog {
    fn record(&self, _entry: &AuditEntry) -> Result<(), AuditError> {
        Ok(())
    }
}
