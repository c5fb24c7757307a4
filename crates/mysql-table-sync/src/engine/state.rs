//! Job and transfer state tracking.
//!
//! TransferState is mutated only through the registry by the job's own
//! task; everyone else gets cloned snapshots, so a reader never observes a
//! half-updated state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TransferError};

/// Unique identifier for a submitted transfer job.
pub type JobId = Uuid;

/// Lifecycle of a transfer job.
///
/// `Pending → Running → {Completed | Failed}`; terminal states never
/// transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Check whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Identifies one table-copy operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferJob {
    /// Job identifier.
    pub id: JobId,

    /// Source database name.
    pub source_database: String,

    /// Target database name.
    pub target_database: String,

    /// Table name (same on both sides).
    pub table: String,

    /// Rows per batch.
    pub batch_size: usize,
}

/// Progress and outcome of a transfer job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferState {
    /// The job this state belongs to.
    pub job: TransferJob,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Rows written so far. Monotonically non-decreasing, preserved on
    /// failure so callers can see how far the transfer got.
    pub rows_processed: u64,

    /// Source row count snapshot taken at job start; None when the
    /// best-effort count failed.
    pub total_rows: Option<u64>,

    /// When the job entered Running.
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,

    /// Last error observed, for diagnostics after failure.
    pub last_error: Option<String>,
}

impl TransferState {
    /// Create a fresh pending state for a job.
    pub fn new(job: TransferJob) -> Self {
        Self {
            job,
            status: JobStatus::Pending,
            rows_processed: 0,
            total_rows: None,
            started_at: None,
            completed_at: None,
            last_error: None,
        }
    }

    /// Transition Pending → Running and record the start time.
    pub fn mark_running(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Record the best-effort total row count.
    pub fn set_total(&mut self, total: Option<u64>) {
        self.total_rows = total;
    }

    /// Account for one written batch.
    pub fn record_batch(&mut self, rows: u64) {
        if self.status == JobStatus::Running {
            self.rows_processed += rows;
        }
    }

    /// Transition Running → Completed.
    pub fn complete(&mut self) {
        if self.status == JobStatus::Running {
            self.status = JobStatus::Completed;
            self.completed_at = Some(Utc::now());
        }
    }

    /// Transition to Failed, preserving rows processed so far.
    pub fn fail(&mut self, error: &TransferError) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Failed;
            self.last_error = Some(error.to_string());
            self.completed_at = Some(Utc::now());
        }
    }

    /// Elapsed seconds between start and completion, once both are known.
    pub fn elapsed_seconds(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }

    /// Convert to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Process-wide job state, keyed by job identifier.
///
/// States live until explicitly removed or process exit; completed jobs are
/// not garbage collected.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<JobId, TransferState>>>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job state.
    pub fn insert(&self, state: TransferState) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(state.job.id, state);
    }

    /// Get a consistent snapshot of a job's state.
    pub fn snapshot(&self, id: JobId) -> Option<TransferState> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(&id).cloned()
    }

    /// Mutate a job's state, returning the snapshot after the mutation.
    pub fn update<F>(&self, id: JobId, f: F) -> Option<TransferState>
    where
        F: FnOnce(&mut TransferState),
    {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let state = map.get_mut(&id)?;
        f(state);
        Some(state.clone())
    }

    /// Remove a job's state, returning it if present.
    pub fn remove(&self, id: JobId) -> Option<TransferState> {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&id)
    }

    /// Snapshot all known job states.
    pub fn jobs(&self) -> Vec<TransferState> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job() -> TransferJob {
        TransferJob {
            id: Uuid::new_v4(),
            source_database: "shop".to_string(),
            target_database: "shop_replica".to_string(),
            table: "orders".to_string(),
            batch_size: 1000,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = TransferState::new(make_job());
        assert_eq!(state.status, JobStatus::Pending);
        assert!(state.started_at.is_none());

        state.mark_running();
        assert_eq!(state.status, JobStatus::Running);
        assert!(state.started_at.is_some());

        state.record_batch(1000);
        state.record_batch(500);
        assert_eq!(state.rows_processed, 1500);

        state.complete();
        assert_eq!(state.status, JobStatus::Completed);
        assert!(state.completed_at.is_some());
        assert!(state.elapsed_seconds().unwrap() >= 0.0);
    }

    #[test]
    fn test_failure_preserves_progress() {
        let mut state = TransferState::new(make_job());
        state.mark_running();
        state.set_total(Some(2500));
        state.record_batch(1000);

        state.fail(&TransferError::write("orders", "connection revoked"));
        assert_eq!(state.status, JobStatus::Failed);
        assert_eq!(state.rows_processed, 1000);
        assert!(state.last_error.as_deref().unwrap().contains("orders"));
    }

    #[test]
    fn test_no_transition_from_terminal_state() {
        let mut state = TransferState::new(make_job());
        state.mark_running();
        state.complete();

        state.fail(&TransferError::Cancelled);
        assert_eq!(state.status, JobStatus::Completed);
        assert!(state.last_error.is_none());

        let mut failed = TransferState::new(make_job());
        failed.mark_running();
        failed.fail(&TransferError::Cancelled);
        failed.complete();
        assert_eq!(failed.status, JobStatus::Failed);
    }

    #[test]
    fn test_record_batch_ignored_when_not_running() {
        let mut state = TransferState::new(make_job());
        state.record_batch(100);
        assert_eq!(state.rows_processed, 0);
    }

    #[test]
    fn test_registry_snapshot_and_update() {
        let registry = JobRegistry::new();
        let job = make_job();
        let id = job.id;
        registry.insert(TransferState::new(job));

        let after = registry
            .update(id, |s| {
                s.mark_running();
                s.record_batch(42);
            })
            .unwrap();
        assert_eq!(after.rows_processed, 42);

        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.status, JobStatus::Running);
        assert_eq!(snapshot.rows_processed, 42);

        assert!(registry.snapshot(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_registry_remove() {
        let registry = JobRegistry::new();
        let job = make_job();
        let id = job.id;
        registry.insert(TransferState::new(job));

        assert!(registry.remove(id).is_some());
        assert!(registry.snapshot(id).is_none());
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }
}
