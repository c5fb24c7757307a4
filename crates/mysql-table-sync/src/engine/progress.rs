//! Progress reporting.

use tracing::info;

use crate::engine::state::TransferState;

/// Receives state snapshots as a transfer advances.
///
/// Called after every batch and on terminal transitions. Implementations
/// must be cheap; the transfer loop blocks on them.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, state: &TransferState);
}

/// Default sink that logs progress via tracing.
#[derive(Debug, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn on_progress(&self, state: &TransferState) {
        match state.total_rows {
            Some(total) if total > 0 => {
                let pct = state.rows_processed as f64 / total as f64 * 100.0;
                info!(
                    "Transfer {} [{}]: {}/{} rows ({:.1}%)",
                    state.job.id, state.job.table, state.rows_processed, total, pct
                );
            }
            _ => {
                info!(
                    "Transfer {} [{}]: {} rows",
                    state.job.id, state.job.table, state.rows_processed
                );
            }
        }
    }
}
