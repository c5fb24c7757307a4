//! Target table materialization.
//!
//! Ensures the destination table exists before the first batch is written.
//! An existing table is left untouched; a schema mismatch there surfaces
//! later as write failures, not here.

use sqlx::mysql::MySqlPool;
use tracing::{debug, info};

use crate::core::quote_ident;
use crate::core::schema::{ColumnDefinition, TableSchema};
use crate::error::{Result, TransferError};

/// Ensure a table matching the source schema exists on the target.
pub async fn ensure_table(pool: &MySqlPool, schema: &TableSchema) -> Result<()> {
    if table_exists(pool, &schema.name).await? {
        debug!("Table '{}' already exists in target database", schema.name);
        return Ok(());
    }

    let ddl = generate_ddl(schema);
    sqlx::query(&ddl)
        .execute(pool)
        .await
        .map_err(|e| TransferError::schema(&schema.name, format!("CREATE TABLE failed: {}", e)))?;

    info!("Created table '{}' in target database", schema.name);
    Ok(())
}

/// Check if a table exists in the pool's database.
pub async fn table_exists(pool: &MySqlPool, table: &str) -> Result<bool> {
    let query = r#"
        SELECT COUNT(*) AS cnt
        FROM INFORMATION_SCHEMA.TABLES
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    "#;

    let count: i64 = sqlx::query_scalar(query)
        .bind(table)
        .fetch_one(pool)
        .await
        .map_err(|e| TransferError::schema(table, format!("checking table existence: {}", e)))?;

    Ok(count > 0)
}

/// Generate the CREATE TABLE statement reproducing the source schema.
pub fn generate_ddl(schema: &TableSchema) -> String {
    let mut defs: Vec<String> = schema
        .columns
        .iter()
        .map(|c| {
            let null_clause = if c.is_nullable { "" } else { " NOT NULL" };
            format!(
                "{} {}{}{}",
                quote_ident(&c.name),
                c.column_type,
                null_clause,
                default_clause(c)
            )
        })
        .collect();

    if schema.has_pk() {
        let pk_cols: Vec<String> = schema.primary_key.iter().map(|c| quote_ident(c)).collect();
        defs.push(format!("PRIMARY KEY ({})", pk_cols.join(", ")));
    }

    format!(
        "CREATE TABLE {} (\n    {}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci",
        quote_ident(&schema.name),
        defs.join(",\n    ")
    )
}

/// Render a DEFAULT clause for a column, if it carries one.
///
/// Numeric defaults and keyword defaults (NULL, CURRENT_TIMESTAMP variants)
/// pass through as-is; everything else is treated as a string literal.
fn default_clause(col: &ColumnDefinition) -> String {
    let Some(value) = &col.default_value else {
        return String::new();
    };

    let upper = value.to_uppercase();
    let is_keyword = upper == "NULL" || upper.starts_with("CURRENT_TIMESTAMP");

    if is_keyword || is_numeric_literal(value) {
        format!(" DEFAULT {}", value)
    } else {
        format!(" DEFAULT '{}'", value.replace('\'', "''"))
    }
}

/// Check for a plain numeric literal safe to emit unquoted.
///
/// `f64::from_str` alone also accepts "inf", "NaN" and overflow forms like
/// "1e999", none of which are valid unquoted SQL.
fn is_numeric_literal(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && value.parse::<f64>().map_or(false, f64::is_finite)
}
