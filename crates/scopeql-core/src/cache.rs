//! Process-wide schema snapshot cache
//!
//! Read-mostly: readers share one `Arc<SchemaSnapshot>` until the version is
//! bumped (after migrations), then the next reader re-introspects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::schema::SchemaSnapshot;
use crate::store::{SchemaSource, StoreError};

pub struct SchemaCache {
    source: Arc<dyn SchemaSource>,
    enabled: bool,
    version: AtomicU64,
    slot: RwLock<Option<(u64, Arc<SchemaSnapshot>)>>,
}

impl SchemaCache {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            source,
            enabled: true,
            version: AtomicU64::new(0),
            slot: RwLock::new(None),
        }
    }

    /// Introspect on every call, never store a snapshot
    pub fn uncached(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            enabled: false,
            ..Self::new(source)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Drop the cached snapshot by bumping the version. Returns the new version.
    pub fn invalidate(&self) -> u64 {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(version, "Schema snapshot invalidated");
        version
    }

    pub fn snapshot(&self) -> Result<Arc<SchemaSnapshot>, StoreError> {
        if !self.enabled {
            return self.source.snapshot().map(Arc::new);
        }

        let current = self.version();
        if let Ok(slot) = self.slot.read() {
            if let Some((version, snapshot)) = slot.as_ref() {
                if *version == current {
                    return Ok(Arc::clone(snapshot));
                }
            }
        }

        let fresh = Arc::new(self.source.snapshot()?);
        tracing::debug!(version = current, tables = fresh.len(), "Schema snapshot refreshed");

        // Tagged with the version read before introspecting, so an
        // invalidation that raced with us forces another refresh.
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some((current, Arc::clone(&fresh)));
        }
        Ok(fresh)
    }
}
