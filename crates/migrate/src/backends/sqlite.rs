//! SQLite Backend Implementation
//!
//! SQLite implementation of the database backend traits. Timestamps are
//! stored as RFC 3339 text.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Pool, Row, Sqlite, ValueRef};

use super::core::*;
use super::DatabaseBackendType;
use crate::error::{MigrateError, MigrateResult};

/// SQLite database backend implementation
#[derive(Debug, Default)]
pub struct SqliteBackend;

impl SqliteBackend {
    pub fn new() -> Self {
        Self
    }

    /// Open a private in-memory database.
    ///
    /// Every connection to `sqlite::memory:` sees its own database, so the
    /// pool is pinned to a single connection that never expires.
    pub async fn in_memory() -> MigrateResult<Arc<dyn DatabasePool>> {
        let config = DatabasePoolConfig {
            max_connections: 1,
            min_connections: 1,
            idle_timeout: None,
            max_lifetime: None,
            ..DatabasePoolConfig::default()
        };
        Self::new().create_pool("sqlite::memory:", config).await
    }
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
    async fn create_pool(&self, database_url: &str, config: DatabasePoolConfig) -> MigrateResult<Arc<dyn DatabasePool>> {
        self.validate_database_url(database_url)?;

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| MigrateError::Connection(format!("Invalid SQLite URL: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::Connection(format!("Failed to create SQLite pool: {}", e)))?;

        Ok(Arc::new(SqlitePool::new(pool)))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    fn validate_database_url(&self, url: &str) -> MigrateResult<()> {
        if !url.starts_with("sqlite:") {
            return Err(MigrateError::Connection("Invalid SQLite URL scheme".to_string()));
        }
        Ok(())
    }
}

/// SQLite connection pool implementation
pub struct SqlitePool {
    pool: Pool<Sqlite>,
}

impl SqlitePool {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabasePool for SqlitePool {
    async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MigrateError::Connection(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(SqliteTransaction { tx: Some(tx) }))
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrateError::Database(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<Box<dyn DatabaseRow>>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::Database(format!("Query fetch failed: {}", e)))?;

        Ok(rows.into_iter().map(SqliteRowValue::boxed).collect())
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>> {
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MigrateError::Database(format!("Query fetch failed: {}", e)))?;

        Ok(row.map(SqliteRowValue::boxed))
    }

    async fn close(&self) -> MigrateResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }
}

/// SQLite transaction implementation
pub struct SqliteTransaction {
    tx: Option<sqlx::Transaction<'static, Sqlite>>,
}

impl SqliteTransaction {
    fn active(&mut self) -> MigrateResult<&mut sqlx::Transaction<'static, Sqlite>> {
        self.tx
            .as_mut()
            .ok_or_else(|| MigrateError::Database("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        let tx = self.active()?;

        let result = bind_all(sqlx::query(sql), params)
            .execute(&mut **tx)
            .await
            .map_err(|e| MigrateError::Database(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<Box<dyn DatabaseRow>>> {
        let tx = self.active()?;

        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| MigrateError::Database(format!("Query fetch failed: {}", e)))?;

        Ok(rows.into_iter().map(SqliteRowValue::boxed).collect())
    }

    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>> {
        let tx = self.active()?;

        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| MigrateError::Database(format!("Query fetch failed: {}", e)))?;

        Ok(row.map(SqliteRowValue::boxed))
    }

    async fn commit(mut self: Box<Self>) -> MigrateResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| MigrateError::Database("Transaction already completed".to_string()))?;

        tx.commit()
            .await
            .map_err(|e| MigrateError::Database(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(mut self: Box<Self>) -> MigrateResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| MigrateError::Database("Transaction already completed".to_string()))?;

        tx.rollback()
            .await
            .map_err(|e| MigrateError::Database(format!("Transaction rollback failed: {}", e)))
    }
}

/// SQLite row implementation
pub struct SqliteRowValue {
    row: SqliteRow,
}

impl SqliteRowValue {
    fn boxed(row: SqliteRow) -> Box<dyn DatabaseRow> {
        Box::new(Self { row })
    }
}

impl DatabaseRow for SqliteRowValue {
    fn get_by_name(&self, name: &str) -> MigrateResult<DatabaseValue> {
        let index = self
            .row
            .columns()
            .iter()
            .position(|col| col.name() == name)
            .ok_or_else(|| MigrateError::Database(format!("Column '{}' not found", name)))?;

        sqlite_value_to_database_value(&self.row, index)
    }

    fn column_count(&self) -> usize {
        self.row.len()
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[DatabaseValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = bind_database_value(query, param);
    }
    query
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &DatabaseValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::DateTime(dt) => query.bind(dt.to_rfc3339()),
    }
}

/// Convert a SQLite column value to DatabaseValue.
///
/// SQLite columns are dynamically typed, so the storage class of the value
/// decides the variant.
fn sqlite_value_to_database_value(row: &SqliteRow, index: usize) -> MigrateResult<DatabaseValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| MigrateError::Database(format!("Failed to read column {}: {}", index, e)))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    if let Ok(value) = row.try_get::<i64, _>(index) {
        return Ok(DatabaseValue::Int64(value));
    }
    if let Ok(value) = row.try_get::<f64, _>(index) {
        return Ok(DatabaseValue::Float64(value));
    }
    if let Ok(value) = row.try_get::<String, _>(index) {
        return Ok(DatabaseValue::String(value));
    }

    row.try_get::<Vec<u8>, _>(index)
        .map(DatabaseValue::Bytes)
        .map_err(|e| MigrateError::Database(format!("Unsupported SQLite value in column {}: {}", index, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let pool = SqliteBackend::in_memory().await.unwrap();
        assert_eq!(pool.dialect(), SqlDialect::SQLite);

        pool.execute("CREATE TABLE t (id INTEGER, name TEXT, at TIMESTAMP)", &[])
            .await
            .unwrap();

        let now = chrono::Utc::now();
        pool.execute(
            "INSERT INTO t (id, name, at) VALUES (?, ?, ?)",
            &[DatabaseValue::Int64(1), "first".into(), now.into()],
        )
        .await
        .unwrap();

        let row = pool.fetch_optional("SELECT id, name, at FROM t", &[]).await.unwrap().unwrap();
        assert_eq!(row.column_count(), 3);
        assert_eq!(row.get_by_name("id").unwrap(), DatabaseValue::Int64(1));
        assert_eq!(row.get_by_name("name").unwrap().as_str(), Some("first"));
        assert_eq!(row.get_by_name("at").unwrap().as_datetime(), Some(now));
        assert!(row.get_by_name("missing").is_err());
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_writes() {
        let pool = SqliteBackend::in_memory().await.unwrap();
        pool.execute("CREATE TABLE t (id INTEGER)", &[]).await.unwrap();

        let mut tx = pool.begin_transaction().await.unwrap();
        tx.execute("INSERT INTO t (id) VALUES (1)", &[]).await.unwrap();
        assert_eq!(tx.fetch_all("SELECT id FROM t", &[]).await.unwrap().len(), 1);
        tx.rollback().await.unwrap();

        assert!(pool.fetch_all("SELECT id FROM t", &[]).await.unwrap().is_empty());

        let mut tx = pool.begin_transaction().await.unwrap();
        tx.execute("INSERT INTO t (id) VALUES (2)", &[]).await.unwrap();
        tx.commit().await.unwrap();

        let rows = pool.fetch_all("SELECT id FROM t", &[]).await.unwrap();
        assert_eq!(rows[0].get_by_name("id").unwrap().as_i64(), Some(2));
    }

    #[test]
    fn test_url_validation() {
        let backend = SqliteBackend::new();
        assert!(backend.validate_database_url("sqlite::memory:").is_ok());
        assert!(backend.validate_database_url("sqlite://data.db").is_ok());
        assert!(backend.validate_database_url("postgres://localhost/db").is_err());
    }
}
