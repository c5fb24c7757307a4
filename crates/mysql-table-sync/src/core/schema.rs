//! Schema metadata types for tables and columns.
//!
//! These types are a faithful snapshot of what the source catalog reports;
//! they are read once per job and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name (unique within its table).
    pub name: String,

    /// Base data type (e.g. "int", "varchar", "datetime"). Used to decode
    /// row values positionally.
    pub data_type: String,

    /// Full declared type string (e.g. "varchar(255)", "decimal(10,2)").
    /// Used verbatim when materializing the target table.
    pub column_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Default value as reported by the catalog, if any.
    pub default_value: Option<String>,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

/// Table metadata.
///
/// Column order is the source's physical column order; it is preserved
/// through materialization and insertion so that positional row values
/// line up on both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<ColumnDefinition>,

    /// Primary key column names (may be empty).
    pub primary_key: Vec<String>,
}

impl TableSchema {
    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Columns that are not part of the primary key, in ordinal order.
    pub fn non_key_columns(&self) -> Vec<&ColumnDefinition> {
        self.columns
            .iter()
            .filter(|c| !self.primary_key.contains(&c.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn make_column(name: &str, data_type: &str) -> ColumnDefinition {
        ColumnDefinition {
            name: name.to_string(),
            data_type: data_type.to_string(),
            column_type: data_type.to_string(),
            is_nullable: true,
            default_value: None,
            ordinal_pos: 1,
        }
    }

    #[test]
    fn test_has_pk() {
        let mut schema = TableSchema {
            name: "orders".to_string(),
            columns: vec![make_column("id", "int"), make_column("total", "decimal")],
            primary_key: vec![],
        };
        assert!(!schema.has_pk());

        schema.primary_key = vec!["id".to_string()];
        assert!(schema.has_pk());
    }

    #[test]
    fn test_non_key_columns() {
        let schema = TableSchema {
            name: "orders".to_string(),
            columns: vec![
                make_column("id", "int"),
                make_column("total", "decimal"),
                make_column("status", "varchar"),
            ],
            primary_key: vec!["id".to_string()],
        };

        let non_key: Vec<&str> = schema
            .non_key_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(non_key, vec!["total", "status"]);
    }

    #[test]
    fn test_column_names_preserve_order() {
        let schema = TableSchema {
            name: "t".to_string(),
            columns: vec![
                make_column("z", "int"),
                make_column("a", "int"),
                make_column("m", "int"),
            ],
            primary_key: vec![],
        };
        assert_eq!(schema.column_names(), vec!["z", "a", "m"]);
    }
}
