//! Transfer orchestration.
//!
//! The engine validates a request, registers a pending job, then runs the
//! transfer pipeline on a spawned task: connect both ends, inspect the
//! source schema, materialize the target table, and pump batches from
//! reader to writer until the table is exhausted, a batch fails, or the
//! job is cancelled.

pub mod progress;
pub mod state;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::value::RowBatch;
use crate::error::{Result, TransferError};
use crate::mysql::{
    count_rows, ensure_table, inspect_table, read_batches, ConnectionProvider, UpsertWriter,
};

pub use progress::{LogProgressSink, ProgressSink};
pub use state::{JobId, JobRegistry, JobStatus, TransferJob, TransferState};

/// How often [`TransferEngine::wait_for`] polls job state.
const JOB_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Aggregated outcome of a multi-table run.
#[derive(Debug, Clone, Serialize)]
pub struct TransferAllSummary {
    pub tables_total: usize,
    pub tables_succeeded: usize,
    pub tables_failed: usize,
    pub rows_transferred: u64,

    /// Terminal state of every table's job, in submission order.
    pub results: Vec<TransferState>,
}

impl TransferAllSummary {
    fn from_results(results: Vec<TransferState>) -> Self {
        let tables_succeeded = results
            .iter()
            .filter(|s| s.status == JobStatus::Completed)
            .count();

        Self {
            tables_total: results.len(),
            tables_succeeded,
            tables_failed: results.len() - tables_succeeded,
            rows_transferred: results.iter().map(|s| s.rows_processed).sum(),
            results,
        }
    }

    /// Check whether every table completed.
    pub fn all_succeeded(&self) -> bool {
        self.tables_failed == 0
    }

    /// Convert to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs table transfers as background jobs and tracks their state.
pub struct TransferEngine {
    provider: Arc<dyn ConnectionProvider>,
    registry: JobRegistry,
    sink: Arc<dyn ProgressSink>,
    default_batch_size: usize,
    cancels: Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>,
}

impl TransferEngine {
    /// Create an engine over a connection provider.
    pub fn new(provider: Arc<dyn ConnectionProvider>, default_batch_size: usize) -> Self {
        Self::with_sink(provider, default_batch_size, Arc::new(LogProgressSink))
    }

    /// Create an engine with a custom progress sink.
    pub fn with_sink(
        provider: Arc<dyn ConnectionProvider>,
        default_batch_size: usize,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            provider,
            registry: JobRegistry::new(),
            sink,
            default_batch_size,
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Submit a transfer job.
    ///
    /// Validates the request up front; nothing is registered and no
    /// connection is opened when validation fails. On success the job is
    /// registered as pending and runs on a spawned task.
    pub fn start_transfer(
        &self,
        source_database: &str,
        target_database: &str,
        table: &str,
        batch_size: Option<usize>,
    ) -> Result<JobId> {
        let batch_size = batch_size.unwrap_or(self.default_batch_size);
        validate_request(source_database, target_database, table, batch_size)?;

        let job = TransferJob {
            id: Uuid::new_v4(),
            source_database: source_database.to_string(),
            target_database: target_database.to_string(),
            table: table.to_string(),
            batch_size,
        };
        let id = job.id;

        self.registry.insert(TransferState::new(job.clone()));

        let (cancel_tx, cancel_rx) = watch::channel(false);
        {
            let mut cancels = self.cancels.lock().unwrap_or_else(|e| e.into_inner());
            cancels.insert(id, cancel_tx);
        }

        let provider = Arc::clone(&self.provider);
        let registry = self.registry.clone();
        let sink = Arc::clone(&self.sink);
        let cancels = Arc::clone(&self.cancels);

        tokio::spawn(async move {
            run_job(provider, registry, sink, job, cancel_rx).await;
            let mut cancels = cancels.lock().unwrap_or_else(|e| e.into_inner());
            cancels.remove(&id);
        });

        info!(
            "Submitted transfer {}: {}.{} -> {}.{} (batch size {})",
            id, source_database, table, target_database, table, batch_size
        );
        Ok(id)
    }

    /// Copy every named table, one job at a time, in the given order.
    ///
    /// A failed table is recorded in the summary and the run continues with
    /// the next one; there is no cross-table atomicity. Fails up front on an
    /// empty table list or invalid request parameters.
    pub async fn transfer_all(
        &self,
        source_database: &str,
        target_database: &str,
        tables: &[String],
        batch_size: Option<usize>,
    ) -> Result<TransferAllSummary> {
        if tables.is_empty() {
            return Err(TransferError::validation("no tables to transfer"));
        }

        let mut results = Vec::with_capacity(tables.len());
        for table in tables {
            let id = self.start_transfer(source_database, target_database, table, batch_size)?;
            results.push(self.wait_for(id).await?);
        }

        let summary = TransferAllSummary::from_results(results);
        info!(
            "Bulk transfer {} -> {}: {}/{} tables succeeded, {} rows",
            source_database,
            target_database,
            summary.tables_succeeded,
            summary.tables_total,
            summary.rows_transferred
        );
        Ok(summary)
    }

    /// Poll a job until it reaches a terminal state.
    pub async fn wait_for(&self, id: JobId) -> Result<TransferState> {
        loop {
            let state = self.get_status(id)?;
            if state.status.is_terminal() {
                return Ok(state);
            }
            tokio::time::sleep(JOB_POLL_INTERVAL).await;
        }
    }

    /// Get a snapshot of a job's state.
    pub fn get_status(&self, id: JobId) -> Result<TransferState> {
        self.registry.snapshot(id).ok_or(TransferError::NotFound(id))
    }

    /// Request cooperative cancellation of a running job.
    ///
    /// Takes effect at the next batch boundary; the batch in flight still
    /// commits. Cancelling a terminal or unknown job is a no-op on state.
    pub fn cancel(&self, id: JobId) -> Result<()> {
        // Existence check first so an unknown id is an error, not a no-op
        self.get_status(id)?;

        let cancels = self.cancels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = cancels.get(&id) {
            let _ = tx.send(true);
            info!("Cancellation requested for transfer {}", id);
        }
        Ok(())
    }

    /// Drop a job's state from the registry.
    pub fn remove(&self, id: JobId) -> Result<TransferState> {
        self.registry.remove(id).ok_or(TransferError::NotFound(id))
    }

    /// Snapshot all known jobs.
    pub fn jobs(&self) -> Vec<TransferState> {
        self.registry.jobs()
    }
}

/// Check a transfer request before any resource is committed to it.
fn validate_request(
    source_database: &str,
    target_database: &str,
    table: &str,
    batch_size: usize,
) -> Result<()> {
    if source_database.is_empty() || target_database.is_empty() || table.is_empty() {
        return Err(TransferError::validation(
            "source database, target database and table must be non-empty",
        ));
    }
    if source_database == target_database {
        return Err(TransferError::validation(format!(
            "source and target database must differ (both are '{}')",
            source_database
        )));
    }
    if batch_size == 0 {
        return Err(TransferError::validation("batch size must be at least 1"));
    }
    Ok(())
}

/// Drive one job to a terminal state. Never propagates errors; failure is
/// recorded on the job state instead.
async fn run_job(
    provider: Arc<dyn ConnectionProvider>,
    registry: JobRegistry,
    sink: Arc<dyn ProgressSink>,
    job: TransferJob,
    cancel_rx: watch::Receiver<bool>,
) {
    let id = job.id;
    let result = execute_job(&provider, &registry, &sink, &job, cancel_rx).await;

    let terminal = registry.update(id, |state| match &result {
        Ok(()) => state.complete(),
        Err(e) => state.fail(e),
    });

    match &result {
        Ok(()) => info!("Transfer {} completed", id),
        Err(TransferError::Cancelled) => warn!("Transfer {} cancelled", id),
        Err(e) => error!("Transfer {} failed: {}", id, e.format_detailed()),
    }

    if let Some(state) = terminal {
        sink.on_progress(&state);
    }
}

async fn execute_job(
    provider: &Arc<dyn ConnectionProvider>,
    registry: &JobRegistry,
    sink: &Arc<dyn ProgressSink>,
    job: &TransferJob,
    cancel_rx: watch::Receiver<bool>,
) -> Result<()> {
    registry.update(job.id, |s| s.mark_running());

    let source = provider.open_connection(&job.source_database).await?;
    let target = provider.open_connection(&job.target_database).await?;

    let schema = inspect_table(&source, &job.table).await?;
    ensure_table(&target, &schema).await?;

    // Best effort: a failed count leaves the total unknown, not the job dead
    let total = match count_rows(&source, &job.table).await {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("Row count for '{}' unavailable: {}", job.table, e);
            None
        }
    };
    registry.update(job.id, |s| s.set_total(total));

    let writer = UpsertWriter::new(target, schema.clone());
    let mut batches = read_batches(source, schema, job.batch_size);

    while let Some(batch) = batches.recv().await {
        if *cancel_rx.borrow() {
            return Err(TransferError::Cancelled);
        }

        let batch: RowBatch = batch?;
        let written = writer.write_batch(&batch).await?;

        if let Some(state) = registry.update(job.id, |s| s.record_batch(written)) {
            sink.on_progress(&state);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use sqlx::mysql::MySqlPool;

    /// Provider that records whether it was asked for a connection.
    struct TrackingProvider {
        called: AtomicBool,
    }

    #[async_trait]
    impl ConnectionProvider for TrackingProvider {
        async fn open_connection(&self, database: &str) -> Result<MySqlPool> {
            self.called.store(true, Ordering::SeqCst);
            Err(TransferError::connection(database, "test provider"))
        }
    }

    /// Provider that always fails to connect.
    struct FailingProvider;

    #[async_trait]
    impl ConnectionProvider for FailingProvider {
        async fn open_connection(&self, database: &str) -> Result<MySqlPool> {
            Err(TransferError::connection(database, "server unreachable"))
        }
    }

    struct CountingSink {
        calls: AtomicUsize,
    }

    impl ProgressSink for CountingSink {
        fn on_progress(&self, _state: &TransferState) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_terminal(engine: &TransferEngine, id: JobId) -> TransferState {
        for _ in 0..100 {
            let state = engine.get_status(id).unwrap();
            if state.status.is_terminal() {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not reach a terminal state", id);
    }

    #[tokio::test]
    async fn test_same_database_rejected_before_connecting() {
        let provider = Arc::new(TrackingProvider {
            called: AtomicBool::new(false),
        });
        let engine = TransferEngine::new(provider.clone(), 1000);

        let err = engine
            .start_transfer("shop", "shop", "orders", None)
            .unwrap_err();
        assert!(matches!(err, TransferError::Validation(_)));
        assert!(!provider.called.load(Ordering::SeqCst));
        assert!(engine.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_empty_names_rejected() {
        let engine = TransferEngine::new(Arc::new(FailingProvider), 1000);

        assert!(matches!(
            engine.start_transfer("", "replica", "orders", None),
            Err(TransferError::Validation(_))
        ));
        assert!(matches!(
            engine.start_transfer("shop", "replica", "", None),
            Err(TransferError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let engine = TransferEngine::new(Arc::new(FailingProvider), 1000);

        assert!(matches!(
            engine.start_transfer("shop", "replica", "orders", Some(0)),
            Err(TransferError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_job_id_is_not_found() {
        let engine = TransferEngine::new(Arc::new(FailingProvider), 1000);
        let id = Uuid::new_v4();

        assert!(matches!(
            engine.get_status(id),
            Err(TransferError::NotFound(_))
        ));
        assert!(matches!(engine.cancel(id), Err(TransferError::NotFound(_))));
        assert!(matches!(engine.remove(id), Err(TransferError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_connection_failure_marks_job_failed() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
        });
        let engine = TransferEngine::with_sink(Arc::new(FailingProvider), 1000, sink.clone());

        let id = engine
            .start_transfer("shop", "replica", "orders", None)
            .unwrap();
        let state = wait_terminal(&engine, id).await;

        assert_eq!(state.status, JobStatus::Failed);
        assert_eq!(state.rows_processed, 0);
        assert!(state
            .last_error
            .as_deref()
            .unwrap()
            .contains("server unreachable"));
        // Terminal transition is reported to the sink
        assert!(sink.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_transfer_all_records_every_table() {
        let engine = TransferEngine::new(Arc::new(FailingProvider), 1000);
        let tables = vec!["orders".to_string(), "customers".to_string()];

        let summary = engine
            .transfer_all("shop", "replica", &tables, None)
            .await
            .unwrap();

        assert_eq!(summary.tables_total, 2);
        assert_eq!(summary.tables_succeeded, 0);
        assert_eq!(summary.tables_failed, 2);
        assert_eq!(summary.rows_transferred, 0);
        assert!(!summary.all_succeeded());

        // One failed table does not stop the rest; both are accounted for
        assert_eq!(summary.results[0].job.table, "orders");
        assert_eq!(summary.results[1].job.table, "customers");
        assert!(summary.results.iter().all(|s| s.last_error.is_some()));
    }

    #[tokio::test]
    async fn test_transfer_all_rejects_empty_table_list() {
        let engine = TransferEngine::new(Arc::new(FailingProvider), 1000);

        assert!(matches!(
            engine.transfer_all("shop", "replica", &[], None).await,
            Err(TransferError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_drops_job_state() {
        let engine = TransferEngine::new(Arc::new(FailingProvider), 1000);

        let id = engine
            .start_transfer("shop", "replica", "orders", None)
            .unwrap();
        wait_terminal(&engine, id).await;

        let removed = engine.remove(id).unwrap();
        assert_eq!(removed.job.id, id);
        assert!(matches!(
            engine.get_status(id),
            Err(TransferError::NotFound(_))
        ));
    }
}
