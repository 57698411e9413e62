//! MariaDB Executor
//!
//! Executes statements against a MariaDB/MySQL server. Every statement names
//! its database explicitly, so one server-level pool serves all databases.

use std::sync::Mutex;
use std::time::Duration;
use serde_json::{Map, Value};
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Executor, MySqlPool, Row};

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::replication::qualified;

/// A result row keyed by column name
pub type JsonRow = Map<String, Value>;

/// MariaDB executor for local writes and reads
pub struct MariaDbExecutor {
    /// Server-level connection pool (no default database)
    pool: Option<MySqlPool>,
    /// Whether this is a mock executor (for testing)
    is_mock: bool,
    /// Statements seen by the mock
    mock_log: Mutex<Vec<String>>,
    /// Error every mock statement fails with
    mock_failure: Option<String>,
    /// Rows the mock returns from `select`
    mock_rows: Vec<JsonRow>,
}

impl MariaDbExecutor {
    /// Create a new executor with a connection pool
    pub async fn new(config: &RelayConfig) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.database.pool_size)
            .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
            .connect(&config.database_url())
            .await?;

        tracing::info!(
            "Connected to database server {}:{}",
            config.database.host,
            config.database.port
        );

        Ok(Self {
            pool: Some(pool),
            is_mock: false,
            mock_log: Mutex::new(Vec::new()),
            mock_failure: None,
            mock_rows: Vec::new(),
        })
    }

    /// Create a mock executor for testing
    pub fn new_mock() -> Self {
        Self {
            pool: None,
            is_mock: true,
            mock_log: Mutex::new(Vec::new()),
            mock_failure: None,
            mock_rows: Vec::new(),
        }
    }

    /// Create a mock executor whose statements all fail with `message`
    pub fn new_failing_mock(message: &str) -> Self {
        Self {
            mock_failure: Some(message.to_string()),
            ..Self::new_mock()
        }
    }

    /// Rows returned by `select` on a mock executor
    pub fn with_mock_rows(mut self, rows: Vec<JsonRow>) -> Self {
        self.mock_rows = rows;
        self
    }

    /// Statements a mock executor has executed, in order
    pub fn executed_statements(&self) -> Vec<String> {
        self.mock_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn pool(&self) -> Result<&MySqlPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| Error::Database(sqlx::Error::Configuration("No pool".into())))
    }

    fn record_mock(&self, sql: &str) -> Result<()> {
        if let Some(message) = &self.mock_failure {
            return Err(Error::Database(sqlx::Error::Protocol(message.clone())));
        }
        if let Ok(mut log) = self.mock_log.lock() {
            log.push(sql.to_string());
        }
        Ok(())
    }

    /// Execute a single statement, returning rows affected
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        tracing::debug!("Executing: {}", &sql[..floor_char_boundary(sql, 100)]);

        if self.is_mock {
            self.record_mock(sql)?;
            return Ok(1);
        }

        let result = self.pool()?.execute(sql).await?;
        Ok(result.rows_affected())
    }

    /// Read every row of a table
    pub async fn select(&self, dbname: &str, table: &str) -> Result<Vec<JsonRow>> {
        let sql = format!("SELECT * FROM {}", qualified(dbname, table));

        if self.is_mock {
            self.record_mock(&sql)?;
            return Ok(self.mock_rows.clone());
        }

        // Plain-string queries use the text protocol, so every non-NULL
        // column arrives as text regardless of its SQL type.
        let rows = self.pool()?.fetch_all(sql.as_str()).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// Check if connection is healthy
    pub async fn health_check(&self) -> Result<bool> {
        if self.is_mock {
            return Ok(self.mock_failure.is_none());
        }

        let row = self.pool()?.fetch_one("SELECT 1").await?;
        let one = row.try_get_unchecked::<String, _>(0).unwrap_or_default();
        Ok(one == "1")
    }

    /// Close the connection pool
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

fn row_to_json(row: &MySqlRow) -> JsonRow {
    let mut object = Map::new();
    for column in row.columns() {
        let value = match row.try_get_unchecked::<Option<Vec<u8>>, _>(column.ordinal()) {
            Ok(raw) => text_value(raw),
            Err(e) => {
                tracing::debug!("Column {} could not be read: {}", column.name(), e);
                Value::Null
            }
        };
        object.insert(column.name().to_string(), value);
    }
    object
}

/// Raw column bytes as a JSON string; invalid UTF-8 is replaced, not dropped
fn text_value(raw: Option<Vec<u8>>) -> Value {
    match raw {
        Some(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        None => Value::Null,
    }
}

/// Largest char boundary at or below `max`
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_executor() {
        let executor = MariaDbExecutor::new_mock();

        assert!(executor.health_check().await.unwrap());
        assert_eq!(executor.execute("CREATE DATABASE IF NOT EXISTS `shop`").await.unwrap(), 1);
        executor.select("shop", "users").await.unwrap();

        assert_eq!(
            executor.executed_statements(),
            vec![
                "CREATE DATABASE IF NOT EXISTS `shop`".to_string(),
                "SELECT * FROM `shop`.`users`".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let executor = MariaDbExecutor::new_failing_mock("access denied");

        assert!(!executor.health_check().await.unwrap());
        let err = executor.execute("DROP DATABASE IF EXISTS `shop`").await.unwrap_err();
        assert!(err.to_string().contains("access denied"));
        assert!(executor.executed_statements().is_empty());
    }

    #[tokio::test]
    async fn test_mock_rows() {
        let mut row = JsonRow::new();
        row.insert("id".into(), Value::String("1".into()));
        row.insert("name".into(), Value::Null);

        let executor = MariaDbExecutor::new_mock().with_mock_rows(vec![row.clone()]);
        assert_eq!(executor.select("shop", "users").await.unwrap(), vec![row]);
    }

    #[test]
    fn test_text_value_keeps_binary_columns() {
        assert_eq!(text_value(Some(b"42".to_vec())), Value::String("42".into()));
        assert_eq!(text_value(Some(vec![0x61, 0xff, 0x62])), Value::String("a\u{FFFD}b".into()));
        assert_eq!(text_value(None), Value::Null);
    }

    #[test]
    fn test_floor_char_boundary() {
        assert_eq!(floor_char_boundary("abc", 100), 3);
        assert_eq!(floor_char_boundary("héllo", 2), 1);
    }
}
