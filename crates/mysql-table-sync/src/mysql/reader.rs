//! Batched source reads.
//!
//! Produces a lazy, finite sequence of row batches over a bounded channel.
//! A spawned producer task pages through the table with LIMIT/OFFSET, so
//! memory stays bounded to one batch (plus the channel depth) and the next
//! batch can be fetched while the writer drains the current one.

use std::future::Future;

use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{Row, ValueRef};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::quote_ident;
use crate::core::schema::{ColumnDefinition, TableSchema};
use crate::core::value::{RowBatch, SqlNullType, SqlValue};
use crate::error::{Result, TransferError};

/// Batches buffered between reader and writer.
const CHANNEL_DEPTH: usize = 4;

/// Count rows in a table.
pub async fn count_rows(pool: &MySqlPool, table: &str) -> Result<u64> {
    let query = format!("SELECT COUNT(*) AS cnt FROM {}", quote_ident(table));

    let count: i64 = sqlx::query_scalar(&query)
        .fetch_one(pool)
        .await
        .map_err(|e| TransferError::read(table, format!("counting rows: {}", e)))?;

    Ok(count.max(0) as u64)
}

/// Start streaming batches from a table.
///
/// Returns a receiver that yields `Result<RowBatch>` until the table is
/// exhausted. The scan uses the database's natural order (no ORDER BY);
/// completeness, not ordering, is the contract. The sequence ends with a
/// short batch (or the channel closing after a full one), and a read
/// failure aborts the remainder.
pub fn read_batches(
    pool: MySqlPool,
    schema: TableSchema,
    batch_size: usize,
) -> mpsc::Receiver<Result<RowBatch>> {
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

    tokio::spawn(async move {
        if let Err(e) = read_batches_impl(&pool, &schema, batch_size, &tx).await {
            let _ = tx.send(Err(e)).await;
        }
    });

    rx
}

async fn read_batches_impl(
    pool: &MySqlPool,
    schema: &TableSchema,
    batch_size: usize,
    tx: &mpsc::Sender<Result<RowBatch>>,
) -> Result<()> {
    let col_list = schema
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let table_ref = quote_ident(&schema.name);

    pump_batches(batch_size, tx, |offset, limit| {
        let query = format!(
            "SELECT {} FROM {} LIMIT {} OFFSET {}",
            col_list, table_ref, limit, offset
        );

        async move {
            let rows: Vec<MySqlRow> = sqlx::query(&query)
                .fetch_all(pool)
                .await
                .map_err(|e| TransferError::read(&schema.name, format!("fetching batch: {}", e)))?;

            rows.iter()
                .map(|row| row_to_values(row, schema))
                .collect::<Result<Vec<_>>>()
        }
    })
    .await
}

/// Drive the paging loop over a page-fetching function.
///
/// Requests pages of `batch_size` rows at increasing offsets until a page
/// comes back short or empty, marking the final batch. Stops early when the
/// receiver is dropped; a fetch error ends the sequence and is returned.
async fn pump_batches<F, Fut>(
    batch_size: usize,
    tx: &mpsc::Sender<Result<RowBatch>>,
    mut fetch_page: F,
) -> Result<()>
where
    F: FnMut(u64, usize) -> Fut,
    Fut: Future<Output = Result<Vec<Vec<SqlValue>>>>,
{
    let mut offset: u64 = 0;

    loop {
        let rows = fetch_page(offset, batch_size).await?;
        if rows.is_empty() {
            break;
        }

        offset += rows.len() as u64;
        let is_last = rows.len() < batch_size;

        debug!("Read batch of {} rows (offset now {})", rows.len(), offset);

        let batch = RowBatch { rows, is_last };

        if tx.send(Ok(batch)).await.is_err() {
            break; // Receiver dropped
        }

        if is_last {
            break;
        }
    }

    Ok(())
}

/// Convert a MySQL row to a positional SqlValue vector.
fn row_to_values(row: &MySqlRow, schema: &TableSchema) -> Result<Vec<SqlValue>> {
    schema
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            decode_value(row, i, col).map_err(|e| {
                TransferError::read(
                    &schema.name,
                    format!("decoding column '{}': {}", col.name, e),
                )
            })
        })
        .collect()
}

/// Decode one column by its base data type.
///
/// Unsigned integer columns widen to the next signed type (u64 stays
/// unsigned) so values above the signed range survive the copy. A decode
/// failure is an error, never a silent NULL.
fn decode_value(
    row: &MySqlRow,
    i: usize,
    col: &ColumnDefinition,
) -> std::result::Result<SqlValue, sqlx::Error> {
    let data_type = col.data_type.to_lowercase();
    let unsigned = is_unsigned(&col.column_type);

    if row.try_get_raw(i)?.is_null() {
        return Ok(SqlValue::Null(null_type_for(&data_type, unsigned)));
    }

    let value = match data_type.as_str() {
        // Integer types
        "tinyint" if unsigned => SqlValue::I16(row.try_get::<u8, _>(i)? as i16),
        "tinyint" => SqlValue::I16(row.try_get::<i8, _>(i)? as i16),
        "smallint" if unsigned => SqlValue::I32(row.try_get::<u16, _>(i)? as i32),
        "smallint" => SqlValue::I16(row.try_get::<i16, _>(i)?),
        "mediumint" | "int" | "integer" if unsigned => {
            SqlValue::I64(row.try_get::<u32, _>(i)? as i64)
        }
        "mediumint" | "int" | "integer" => SqlValue::I32(row.try_get::<i32, _>(i)?),
        "bigint" if unsigned => SqlValue::U64(row.try_get::<u64, _>(i)?),
        "bigint" => SqlValue::I64(row.try_get::<i64, _>(i)?),

        // Floating point
        "float" => SqlValue::F32(row.try_get::<f32, _>(i)?),
        "double" | "real" => SqlValue::F64(row.try_get::<f64, _>(i)?),

        // Decimal
        "decimal" | "numeric" => SqlValue::Decimal(row.try_get::<rust_decimal::Decimal, _>(i)?),

        // Boolean
        "bit" | "boolean" | "bool" => SqlValue::Bool(row.try_get::<bool, _>(i)?),

        // Binary types
        "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" => {
            SqlValue::Bytes(row.try_get::<Vec<u8>, _>(i)?)
        }

        // Date/Time types
        "date" => SqlValue::Date(row.try_get::<chrono::NaiveDate, _>(i)?),
        "time" => SqlValue::Time(row.try_get::<chrono::NaiveTime, _>(i)?),
        "datetime" | "timestamp" => {
            SqlValue::DateTime(row.try_get::<chrono::NaiveDateTime, _>(i)?)
        }

        // String types (char/varchar/text/enum/set/json) and anything
        // unknown fall back to text
        _ => SqlValue::Text(row.try_get::<String, _>(i)?),
    };

    Ok(value)
}

/// Check whether a declared column type is unsigned.
///
/// `COLUMN_TYPE` carries the marker (`int unsigned`, `bigint(20) unsigned
/// zerofill`); `DATA_TYPE` does not.
fn is_unsigned(column_type: &str) -> bool {
    column_type.to_lowercase().contains("unsigned")
}

/// Get the appropriate null type for a MySQL data type.
fn null_type_for(data_type: &str, unsigned: bool) -> SqlNullType {
    match data_type {
        "tinyint" => SqlNullType::I16,
        "smallint" => {
            if unsigned {
                SqlNullType::I32
            } else {
                SqlNullType::I16
            }
        }
        "mediumint" | "int" | "integer" => {
            if unsigned {
                SqlNullType::I64
            } else {
                SqlNullType::I32
            }
        }
        "bigint" => {
            if unsigned {
                SqlNullType::U64
            } else {
                SqlNullType::I64
            }
        }
        "float" => SqlNullType::F32,
        "double" | "real" => SqlNullType::F64,
        "decimal" | "numeric" => SqlNullType::Decimal,
        "bit" | "boolean" | "bool" => SqlNullType::Bool,
        "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" => {
            SqlNullType::Bytes
        }
        "date" => SqlNullType::Date,
        "time" => SqlNullType::Time,
        "datetime" | "timestamp" => SqlNullType::DateTime,
        _ => SqlNullType::String,
    }
}
