//! SQL value types for type-safe row handling.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// Type hint for NULL values so binds carry the expected column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    U64,
    F32,
    F64,
    String,
    Bytes,
    Decimal,
    Date,
    Time,
    DateTime,
}

/// SQL value enum covering the MySQL types the engine moves.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL with type hint.
    Null(SqlNullType),

    /// Boolean value (bit/boolean).
    Bool(bool),

    /// 16-bit signed integer (tinyint/smallint).
    I16(i16),

    /// 32-bit signed integer (int/mediumint).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 64-bit unsigned integer (bigint unsigned).
    U64(u64),

    /// 32-bit floating point (float).
    F32(f32),

    /// 64-bit floating point (double).
    F64(f64),

    /// Text/string data (char/varchar/text/enum/set/json).
    Text(String),

    /// Binary data (binary/varbinary/blob).
    Bytes(Vec<u8>),

    /// Decimal value with arbitrary precision.
    Decimal(Decimal),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),

    /// Timestamp without timezone (datetime/timestamp).
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Get the SqlNullType for this value.
    #[must_use]
    pub fn null_type(&self) -> SqlNullType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::Bool(_) => SqlNullType::Bool,
            SqlValue::I16(_) => SqlNullType::I16,
            SqlValue::I32(_) => SqlNullType::I32,
            SqlValue::I64(_) => SqlNullType::I64,
            SqlValue::U64(_) => SqlNullType::U64,
            SqlValue::F32(_) => SqlNullType::F32,
            SqlValue::F64(_) => SqlNullType::F64,
            SqlValue::Text(_) => SqlNullType::String,
            SqlValue::Bytes(_) => SqlNullType::Bytes,
            SqlValue::Decimal(_) => SqlNullType::Decimal,
            SqlValue::Date(_) => SqlNullType::Date,
            SqlValue::Time(_) => SqlNullType::Time,
            SqlValue::DateTime(_) => SqlNullType::DateTime,
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::I16(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

/// A batch of rows read from the source in one pass.
///
/// Rows are positional against the table schema's column order. A batch is
/// produced by the batch reader and consumed exactly once by the upsert
/// writer.
#[derive(Debug)]
pub struct RowBatch {
    /// Rows in this batch.
    pub rows: Vec<Vec<SqlValue>>,

    /// Whether this is the final batch of the scan.
    pub is_last: bool,
}

impl RowBatch {
    /// Create a new batch with the given rows.
    pub fn new(rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            rows,
            is_last: false,
        }
    }

    /// Mark this as the final batch.
    pub fn mark_final(mut self) -> Self {
        self.is_last = true;
        self
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
