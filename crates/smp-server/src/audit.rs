//! Audit sink and retention
//!
//! Audit logging is fire-and-forget: a failing audit write never reverts or
//! blocks the action it records.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use smp_core::{AuditRecord, SmpError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::storage::RegistryStore;

/// Destination of audit records
pub trait AuditSink: Send + Sync {
    /// Record a completed action
    fn log(&self, record: AuditRecord);
}

/// Writes audit records to the registry store in the background
#[derive(Debug, Clone)]
pub struct StoreAuditSink {
    store: Arc<dyn RegistryStore>,
}

impl StoreAuditSink {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }
}

impl AuditSink for StoreAuditSink {
    fn log(&self, record: AuditRecord) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(action = %record.action, "No runtime available, audit record dropped");
            return;
        };
        let store = self.store.clone();
        handle.spawn(async move {
            let action = record.action.clone();
            if let Err(e) = store.append_audit(record).await {
                error!(action = %action, error = %e, "Failed to write audit record");
            }
        });
    }
}

/// Keeps audit records in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    /// Recorded action names, oldest first
    pub fn actions(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.action.clone()).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn log(&self, record: AuditRecord) {
        debug!(action = %record.action, subject = ?record.subject, "Audit");
        self.records.lock().push(record);
    }
}

/// Remove audit records older than `retention_days`, returns how many went.
pub async fn purge_expired_audit(store: &dyn RegistryStore, retention_days: u32) -> smp_core::Result<u64> {
    let cutoff = Utc::now()
        .checked_sub_signed(Duration::days(i64::from(retention_days)))
        .ok_or_else(|| SmpError::Validation(format!("Audit retention of {} days is out of range", retention_days)))?;
    Ok(store.purge_audit_before(cutoff).await?)
}

/// Purge audit records older than `retention_days`, once now and then daily.
///
/// Failures are logged and retried on the next run.
pub fn spawn_retention_task(store: Arc<dyn RegistryStore>, retention_days: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(StdDuration::from_secs(24 * 60 * 60));
        loop {
            interval.tick().await;
            match purge_expired_audit(store.as_ref(), retention_days).await {
                Ok(removed) => info!(removed, retention_days, "Purged old audit records"),
                Err(e) => error!(error = %e, "Failed to purge audit log"),
            }
        }
    })
}
