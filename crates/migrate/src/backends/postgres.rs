//! PostgreSQL Backend Implementation
//!
//! PostgreSQL implementation of the database backend traits using sqlx as
//! the underlying database driver.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Pool, Postgres, Row, TypeInfo, ValueRef};

use super::core::*;
use super::DatabaseBackendType;
use crate::error::{MigrateError, MigrateResult};

/// PostgreSQL database backend implementation
#[derive(Debug, Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    async fn create_pool(&self, database_url: &str, config: DatabasePoolConfig) -> MigrateResult<Arc<dyn DatabasePool>> {
        self.validate_database_url(database_url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| MigrateError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        Ok(Arc::new(PostgresPool::new(pool)))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::PostgreSQL
    }

    fn validate_database_url(&self, url: &str) -> MigrateResult<()> {
        if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
            return Err(MigrateError::Connection("Invalid PostgreSQL URL scheme".to_string()));
        }
        Ok(())
    }
}

/// PostgreSQL connection pool implementation
pub struct PostgresPool {
    pool: Pool<Postgres>,
}

impl PostgresPool {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MigrateError::Connection(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
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

        Ok(rows.into_iter().map(PostgresRow::boxed).collect())
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>> {
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MigrateError::Database(format!("Query fetch failed: {}", e)))?;

        Ok(row.map(PostgresRow::boxed))
    }

    async fn close(&self) -> MigrateResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    fn active(&mut self) -> MigrateResult<&mut sqlx::Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| MigrateError::Database("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
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

        Ok(rows.into_iter().map(PostgresRow::boxed).collect())
    }

    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>> {
        let tx = self.active()?;

        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| MigrateError::Database(format!("Query fetch failed: {}", e)))?;

        Ok(row.map(PostgresRow::boxed))
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

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: PgRow,
}

impl PostgresRow {
    fn boxed(row: PgRow) -> Box<dyn DatabaseRow> {
        Box::new(Self { row })
    }
}

impl DatabaseRow for PostgresRow {
    fn get_by_name(&self, name: &str) -> MigrateResult<DatabaseValue> {
        let index = self
            .row
            .columns()
            .iter()
            .position(|col| col.name() == name)
            .ok_or_else(|| MigrateError::Database(format!("Column '{}' not found", name)))?;

        postgres_value_to_database_value(&self.row, index)
    }

    fn column_count(&self) -> usize {
        self.row.len()
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[DatabaseValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = bind_database_value(query, param);
    }
    query
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
    }
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> MigrateResult<DatabaseValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| MigrateError::Database(format!("Failed to read column {}: {}", index, e)))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = row.columns()[index].type_info().name().to_string();
    let decode_err = |e: sqlx::Error| MigrateError::Database(format!("Failed to decode {} value: {}", type_name, e));

    match type_name.as_str() {
        "BOOL" => Ok(DatabaseValue::Bool(row.try_get(index).map_err(decode_err)?)),
        "INT2" => Ok(DatabaseValue::Int64(row.try_get::<i16, _>(index).map_err(decode_err)? as i64)),
        "INT4" => Ok(DatabaseValue::Int64(row.try_get::<i32, _>(index).map_err(decode_err)? as i64)),
        "INT8" => Ok(DatabaseValue::Int64(row.try_get(index).map_err(decode_err)?)),
        "FLOAT4" => Ok(DatabaseValue::Float64(row.try_get::<f32, _>(index).map_err(decode_err)? as f64)),
        "FLOAT8" => Ok(DatabaseValue::Float64(row.try_get(index).map_err(decode_err)?)),
        "BYTEA" => Ok(DatabaseValue::Bytes(row.try_get(index).map_err(decode_err)?)),
        "TIMESTAMPTZ" => Ok(DatabaseValue::DateTime(row.try_get(index).map_err(decode_err)?)),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = row.try_get(index).map_err(decode_err)?;
            Ok(DatabaseValue::DateTime(chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc)))
        }
        _ => Ok(DatabaseValue::String(row.try_get(index).map_err(decode_err)?)),
    }
}
