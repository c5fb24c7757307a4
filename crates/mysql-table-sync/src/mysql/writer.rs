//! Upsert writes to the target table.
//!
//! Each RowBatch goes out as one multi-row statement inside a transaction,
//! so a batch either lands fully or not at all. One retry is allowed before
//! a batch failure becomes fatal for the job.

use sqlx::mysql::{MySql, MySqlArguments, MySqlPool};
use sqlx::query::Query;
use tracing::{debug, warn};

use crate::core::quote_ident;
use crate::core::schema::TableSchema;
use crate::core::value::{RowBatch, SqlNullType, SqlValue};
use crate::error::{Result, TransferError};

/// MySQL hard limit on prepared-statement placeholders.
const MYSQL_MAX_PLACEHOLDERS: usize = 65_535;

/// How row conflicts on the target are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictMode {
    /// INSERT ... ON DUPLICATE KEY UPDATE, updating all non-key columns.
    UpdateOnDuplicate,

    /// INSERT IGNORE: duplicates on any unique constraint are skipped.
    ///
    /// Used when the table has no primary key, or when every column is part
    /// of the key and there is nothing to update. Without any unique
    /// constraint every row always inserts, so repeated transfers of such
    /// tables duplicate rows; that is an accepted limitation, not something
    /// the writer tries to fix.
    InsertIgnore,
}

/// Applies row batches to the destination with conflict resolution.
pub struct UpsertWriter {
    pool: MySqlPool,
    schema: TableSchema,
    mode: ConflictMode,
}

impl UpsertWriter {
    /// Create a writer for the given target pool and table schema.
    pub fn new(pool: MySqlPool, schema: TableSchema) -> Self {
        let mode = conflict_mode(&schema);
        Self { pool, schema, mode }
    }

    /// Write all rows of a batch, returning the count written.
    ///
    /// The batch is atomic: on failure the transaction rolls back and the
    /// whole batch is retried once before escalating to a write error.
    pub async fn write_batch(&self, batch: &RowBatch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        if let Err(first) = self.try_write(batch).await {
            warn!(
                "Batch write to '{}' failed, retrying once: {}",
                self.schema.name, first
            );
            self.try_write(batch)
                .await
                .map_err(|e| TransferError::write(&self.schema.name, e))?;
        }

        debug!(
            "Wrote {} rows to '{}' ({:?})",
            batch.len(),
            self.schema.name,
            self.mode
        );
        Ok(batch.len() as u64)
    }

    async fn try_write(&self, batch: &RowBatch) -> std::result::Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let per_statement = rows_per_statement(self.schema.columns.len());
        for chunk in batch.rows.chunks(per_statement) {
            let sql = self.build_statement(chunk.len());
            let mut query = sqlx::query(&sql);
            for row in chunk {
                for value in row {
                    query = bind_value(query, value);
                }
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await
    }

    /// Build the multi-row insert statement for `row_count` rows.
    fn build_statement(&self, row_count: usize) -> String {
        let col_list = self
            .schema
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        let row_placeholders = format!(
            "({})",
            vec!["?"; self.schema.columns.len()].join(", ")
        );
        let values = vec![row_placeholders; row_count].join(", ");
        let table = quote_ident(&self.schema.name);

        match self.mode {
            ConflictMode::InsertIgnore => {
                format!("INSERT IGNORE INTO {} ({}) VALUES {}", table, col_list, values)
            }
            ConflictMode::UpdateOnDuplicate => {
                let update_set = self
                    .schema
                    .non_key_columns()
                    .iter()
                    .map(|c| {
                        format!("{} = VALUES({})", quote_ident(&c.name), quote_ident(&c.name))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");

                format!(
                    "INSERT INTO {} ({}) VALUES {} ON DUPLICATE KEY UPDATE {}",
                    table, col_list, values, update_set
                )
            }
        }
    }
}

/// Pick the conflict mode for a table schema.
fn conflict_mode(schema: &TableSchema) -> ConflictMode {
    if schema.has_pk() && !schema.non_key_columns().is_empty() {
        ConflictMode::UpdateOnDuplicate
    } else {
        ConflictMode::InsertIgnore
    }
}

/// Rows that fit in one statement under the placeholder limit.
fn rows_per_statement(num_cols: usize) -> usize {
    (MYSQL_MAX_PLACEHOLDERS / num_cols.max(1)).max(1)
}

/// Bind a SqlValue to the next placeholder.
fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null(t) => match t {
            SqlNullType::Bool => query.bind(Option::<bool>::None),
            SqlNullType::I16 => query.bind(Option::<i16>::None),
            SqlNullType::I32 => query.bind(Option::<i32>::None),
            SqlNullType::I64 => query.bind(Option::<i64>::None),
            SqlNullType::U64 => query.bind(Option::<u64>::None),
            SqlNullType::F32 => query.bind(Option::<f32>::None),
            SqlNullType::F64 => query.bind(Option::<f64>::None),
            SqlNullType::String => query.bind(Option::<String>::None),
            SqlNullType::Bytes => query.bind(Option::<Vec<u8>>::None),
            SqlNullType::Decimal => query.bind(Option::<rust_decimal::Decimal>::None),
            SqlNullType::Date => query.bind(Option::<chrono::NaiveDate>::None),
            SqlNullType::Time => query.bind(Option::<chrono::NaiveTime>::None),
            SqlNullType::DateTime => query.bind(Option::<chrono::NaiveDateTime>::None),
        },
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::I16(v) => query.bind(*v),
        SqlValue::I32(v) => query.bind(*v),
        SqlValue::I64(v) => query.bind(*v),
        SqlValue::U64(v) => query.bind(*v),
        SqlValue::F32(v) => query.bind(*v),
        SqlValue::F64(v) => query.bind(*v),
        SqlValue::Text(s) => query.bind(s.as_str()),
        SqlValue::Bytes(b) => query.bind(b.as_slice()),
        SqlValue::Decimal(d) => query.bind(*d),
        SqlValue::Date(d) => query.bind(*d),
        SqlValue::Time(t) => query.bind(*t),
        SqlValue::DateTime(dt) => query.bind(*dt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ColumnDefinition;

    fn make_column(name: &str) -> ColumnDefinition {
        ColumnDefinition {
            name: name.to_string(),
            data_type: "varchar".to_string(),
            column_type: "varchar(255)".to_string(),
            is_nullable: true,
            default_value: None,
            ordinal_pos: 1,
        }
    }

    fn make_schema(columns: &[&str], pk: &[&str]) -> TableSchema {
        TableSchema {
            name: "orders".to_string(),
            columns: columns.iter().map(|c| make_column(c)).collect(),
            primary_key: pk.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn writer_for(schema: TableSchema) -> UpsertWriter {
        // Lazy pool: never connects, only used for statement-building tests.
        let pool = MySqlPool::connect_lazy("mysql://localhost/test").unwrap();
        UpsertWriter::new(pool, schema)
    }

    #[tokio::test]
    async fn test_statement_with_pk_updates_non_key_columns() {
        let writer = writer_for(make_schema(&["id", "name", "email"], &["id"]));
        let sql = writer.build_statement(2);

        assert!(sql.starts_with("INSERT INTO `orders` (`id`, `name`, `email`)"));
        assert!(sql.contains("VALUES (?, ?, ?), (?, ?, ?)"));
        assert!(sql.contains("ON DUPLICATE KEY UPDATE"));
        assert!(sql.contains("`name` = VALUES(`name`)"));
        assert!(sql.contains("`email` = VALUES(`email`)"));
        assert!(!sql.contains("`id` = VALUES(`id`)"));
    }

    #[tokio::test]
    async fn test_statement_without_pk_uses_insert_ignore() {
        let writer = writer_for(make_schema(&["message", "level"], &[]));
        let sql = writer.build_statement(1);

        assert!(sql.starts_with("INSERT IGNORE INTO `orders`"));
        assert!(!sql.contains("ON DUPLICATE KEY UPDATE"));
    }

    #[tokio::test]
    async fn test_statement_key_only_table_uses_insert_ignore() {
        let writer = writer_for(make_schema(&["id"], &["id"]));
        let sql = writer.build_statement(3);

        assert!(sql.starts_with("INSERT IGNORE INTO `orders` (`id`) VALUES (?), (?), (?)"));
    }

    #[test]
    fn test_conflict_mode_selection() {
        assert_eq!(
            conflict_mode(&make_schema(&["id", "v"], &["id"])),
            ConflictMode::UpdateOnDuplicate
        );
        assert_eq!(
            conflict_mode(&make_schema(&["a", "b"], &[])),
            ConflictMode::InsertIgnore
        );
        assert_eq!(
            conflict_mode(&make_schema(&["id"], &["id"])),
            ConflictMode::InsertIgnore
        );
    }

    #[test]
    fn test_rows_per_statement_respects_placeholder_cap() {
        assert_eq!(rows_per_statement(1), 65_535);
        assert_eq!(rows_per_statement(10), 6_553);
        assert_eq!(rows_per_statement(0), 65_535);
        // Very wide table still makes progress one row at a time
        assert_eq!(rows_per_statement(100_000), 1);
    }
}
