//! MySQL driver: connection provisioning, catalog introspection, batched
//! reads, and upsert writes.

pub mod inspector;
pub mod materialize;
pub mod provider;
pub mod reader;
pub mod writer;

pub use inspector::inspect_table;
pub use materialize::ensure_table;
pub use provider::{ConnectionProvider, MysqlConnectionProvider};
pub use reader::{count_rows, read_batches};
pub use writer::UpsertWriter;
