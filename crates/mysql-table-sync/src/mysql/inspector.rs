//! Schema introspection against the MySQL catalog.

use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::Row;
use tracing::debug;

use crate::core::schema::{ColumnDefinition, TableSchema};
use crate::error::{Result, TransferError};

/// Read column definitions and primary-key metadata for a table.
///
/// Columns come back in the source's physical column order
/// (`ORDINAL_POSITION`), which downstream materialization and insertion
/// rely on for positional correctness. Fails with a schema error when the
/// table does not exist in the pool's database.
pub async fn inspect_table(pool: &MySqlPool, table: &str) -> Result<TableSchema> {
    // CAST to CHAR to handle collation differences where information_schema
    // may return VARBINARY instead of VARCHAR
    let query = r#"
        SELECT
            CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
            CAST(DATA_TYPE AS CHAR(255)) AS DATA_TYPE,
            CAST(COLUMN_TYPE AS CHAR(255)) AS COLUMN_TYPE,
            CAST(IF(IS_NULLABLE = 'YES', 1, 0) AS SIGNED) AS is_nullable,
            CAST(COLUMN_DEFAULT AS CHAR(4000)) AS COLUMN_DEFAULT,
            CAST(ORDINAL_POSITION AS SIGNED) AS ORDINAL_POSITION
        FROM INFORMATION_SCHEMA.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
    "#;

    let rows: Vec<MySqlRow> = sqlx::query(query)
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| TransferError::schema(table, format!("loading columns: {}", e)))?;

    if rows.is_empty() {
        return Err(TransferError::schema(
            table,
            "table does not exist or has no columns",
        ));
    }

    let columns: Vec<ColumnDefinition> = rows
        .iter()
        .map(|row| ColumnDefinition {
            name: row.get::<String, _>("COLUMN_NAME"),
            data_type: row.get::<String, _>("DATA_TYPE"),
            column_type: row.get::<String, _>("COLUMN_TYPE"),
            is_nullable: row.get::<i64, _>("is_nullable") == 1,
            default_value: row.get::<Option<String>, _>("COLUMN_DEFAULT"),
            ordinal_pos: row.get::<i64, _>("ORDINAL_POSITION") as i32,
        })
        .collect();

    let primary_key = load_primary_key(pool, table).await?;

    debug!(
        "Inspected table '{}': {} columns, pk [{}]",
        table,
        columns.len(),
        primary_key.join(", ")
    );

    Ok(TableSchema {
        name: table.to_string(),
        columns,
        primary_key,
    })
}

/// Load primary key column names for a table, in key order.
async fn load_primary_key(pool: &MySqlPool, table: &str) -> Result<Vec<String>> {
    let query = r#"
        SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
        FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
        ORDER BY ORDINAL_POSITION
    "#;

    let rows: Vec<MySqlRow> = sqlx::query(query)
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|e| TransferError::schema(table, format!("loading primary key: {}", e)))?;

    Ok(rows
        .iter()
        .map(|row| row.get::<String, _>("COLUMN_NAME"))
        .collect())
}
