//! MySQL single-table transfer engine.
//!
//! Copies one table between two databases on the same MySQL server:
//! inspects the source schema, creates the target table when missing, and
//! streams rows in batches with upsert conflict resolution. Transfers run
//! as background jobs with observable progress and cooperative
//! cancellation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mysql_table_sync::{Config, MysqlConnectionProvider, TransferEngine};
//!
//! # async fn run() -> mysql_table_sync::Result<()> {
//! let config = Config::load("config.yaml")?;
//! let provider = MysqlConnectionProvider::new(
//!     config.server.clone(),
//!     config.transfer.max_connections,
//! );
//! let engine = TransferEngine::new(Arc::new(provider), config.transfer.batch_size);
//!
//! let id = engine.start_transfer("shop", "shop_replica", "orders", None)?;
//! let state = engine.get_status(id)?;
//! println!("{}", state.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod mysql;

pub use config::{Config, ServerConfig, TransferSettings, DEFAULT_BATCH_SIZE};
pub use core::{ColumnDefinition, RowBatch, SqlNullType, SqlValue, TableSchema};
pub use engine::{
    JobId, JobRegistry, JobStatus, LogProgressSink, ProgressSink, TransferAllSummary,
    TransferEngine, TransferJob, TransferState,
};
pub use error::{Result, TransferError};
pub use mysql::{ConnectionProvider, MysqlConnectionProvider};
