//! Connection provisioning and server discovery.
//!
//! The engine selects databases by name at job submission time; this module
//! owns how those names become live connection pools. Credentials, pooling
//! and TLS stay behind the [`ConnectionProvider`] seam.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::{Result, TransferError};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Schemas owned by the server itself, hidden from discovery.
const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "mysql", "performance_schema", "sys"];

/// Supplies live connections to named databases on one server.
///
/// The engine never sees connection strings or credentials; swapping this
/// seam is also how tests run jobs without a live server.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Open a connection pool to the named database.
    async fn open_connection(&self, database: &str) -> Result<MySqlPool>;
}

/// Production provider backed by a single MySQL server.
pub struct MysqlConnectionProvider {
    server: ServerConfig,
    max_connections: usize,
}

impl MysqlConnectionProvider {
    /// Create a provider for the given server.
    pub fn new(server: ServerConfig, max_connections: usize) -> Self {
        Self {
            server,
            max_connections,
        }
    }

    async fn connect(&self, database: Option<&str>) -> Result<MySqlPool> {
        let label = database.unwrap_or("(server)");

        let mut options = MySqlConnectOptions::new()
            .host(&self.server.host)
            .port(self.server.port)
            .username(&self.server.user)
            .password(&self.server.password);

        if let Some(db) = database {
            options = options.database(db);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| TransferError::connection(label, e))?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| TransferError::connection(label, e))?;

        info!(
            "Connected to MySQL: {}:{}/{}",
            self.server.host, self.server.port, label
        );

        Ok(pool)
    }

    /// Check that the server is reachable with the configured credentials.
    pub async fn ping(&self) -> Result<()> {
        let pool = self.connect(None).await?;
        pool.close().await;
        Ok(())
    }

    /// List user databases on the server, in server order.
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let pool = self.connect(None).await?;

        let rows: Vec<MySqlRow> = sqlx::query("SHOW DATABASES")
            .fetch_all(&pool)
            .await
            .map_err(|e| TransferError::connection("(server)", e))?;

        let databases: Vec<String> = rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>(0).ok())
            .filter(|name| !SYSTEM_SCHEMAS.contains(&name.as_str()))
            .collect();

        pool.close().await;

        debug!("Found {} user databases", databases.len());
        Ok(databases)
    }

    /// List base tables in a database with their approximate row counts.
    ///
    /// Row counts come from the catalog's statistics, so they are estimates
    /// suitable for display, not for progress accounting.
    pub async fn list_tables(&self, database: &str) -> Result<Vec<(String, i64)>> {
        let pool = self.connect(None).await?;

        // CAST to CHAR to handle collation differences in information_schema
        let query = r#"
            SELECT
                CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME,
                CAST(COALESCE(TABLE_ROWS, 0) AS SIGNED) AS approx_rows
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(database)
            .fetch_all(&pool)
            .await
            .map_err(|e| TransferError::connection(database, e))?;

        let tables: Vec<(String, i64)> = rows
            .iter()
            .map(|row| {
                (
                    row.get::<String, _>("TABLE_NAME"),
                    row.get::<i64, _>("approx_rows"),
                )
            })
            .collect();

        pool.close().await;

        debug!("Found {} tables in database '{}'", tables.len(), database);
        Ok(tables)
    }
}

#[async_trait]
impl ConnectionProvider for MysqlConnectionProvider {
    async fn open_connection(&self, database: &str) -> Result<MySqlPool> {
        self.connect(Some(database)).await
    }
}
