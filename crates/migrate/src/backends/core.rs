//! Core Database Backend Traits
//!
//! The migrator talks to the target database only through these traits, so
//! the planner and executor stay independent of the driver in use.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::backends::DatabaseBackendType;
use crate::error::{MigrateError, MigrateResult};

/// Abstract database transaction trait
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a statement within the transaction and return affected rows count
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64>;

    /// Execute a query and return result rows within the transaction
    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query and return the first result row within the transaction
    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// Abstract database connection pool trait
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Begin a transaction from the pool
    async fn begin_transaction(&self) -> MigrateResult<Box<dyn DatabaseTransaction>>;

    /// Execute a statement directly on the pool
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64>;

    /// Execute a query and return result rows directly on the pool
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query and return the first result row directly on the pool
    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>>;

    /// Close the pool
    async fn close(&self) -> MigrateResult<()>;

    /// SQL dialect spoken by the pool's connections
    fn dialect(&self) -> SqlDialect;
}

/// Abstract database row trait
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by name
    fn get_by_name(&self, name: &str) -> MigrateResult<DatabaseValue>;

    /// Get column count
    fn column_count(&self) -> usize;
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::Bool(b) => Some(*b as i64),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read a timestamp, accepting the text encodings SQLite stores
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            DatabaseValue::DateTime(dt) => Some(*dt),
            DatabaseValue::String(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Column accessor that turns a missing or mistyped value into an error
    pub fn into_i64(self, column: &str) -> MigrateResult<i64> {
        self.as_i64()
            .ok_or_else(|| MigrateError::Database(format!("Column '{}' is not an integer: {:?}", column, self)))
    }

    pub fn into_string(self, column: &str) -> MigrateResult<String> {
        match self {
            DatabaseValue::String(s) => Ok(s),
            other => Err(MigrateError::Database(format!("Column '{}' is not text: {:?}", column, other))),
        }
    }

    pub fn into_datetime(self, column: &str) -> MigrateResult<DateTime<Utc>> {
        self.as_datetime()
            .ok_or_else(|| MigrateError::Database(format!("Column '{}' is not a timestamp: {:?}", column, self)))
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect (zero-based index)
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        '"'
    }

    /// Quote an identifier, doubling embedded quote characters
    pub fn quote_identifier(&self, identifier: &str) -> String {
        let quote = self.identifier_quote();
        let escaped = identifier.replace(quote, &format!("{}{}", quote, quote));
        format!("{}{}{}", quote, escaped, quote)
    }

    pub fn supports_schemas(&self) -> bool {
        matches!(self, SqlDialect::PostgreSQL)
    }

    /// Quoted, optionally schema-qualified table name
    pub fn qualified_table(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) if self.supports_schemas() => {
                format!("{}.{}", self.quote_identifier(schema), self.quote_identifier(table))
            }
            _ => self.quote_identifier(table),
        }
    }

    /// Column type used for ledger timestamps
    pub fn timestamp_type(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "TIMESTAMP WITH TIME ZONE",
            SqlDialect::SQLite => "TIMESTAMP",
        }
    }

    /// Column type used for ledger names
    pub fn text_type(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "VARCHAR(255)",
            SqlDialect::SQLite => "TEXT",
        }
    }
}

/// Database backend trait that provides database-specific implementations
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Create a connection pool from a database URL
    async fn create_pool(&self, database_url: &str, config: DatabasePoolConfig) -> MigrateResult<Arc<dyn DatabasePool>>;

    /// Get the SQL dialect used by this backend
    fn sql_dialect(&self) -> SqlDialect;

    /// Get the backend type
    fn backend_type(&self) -> DatabaseBackendType;

    /// Validate a database URL for this backend
    fn validate_database_url(&self, url: &str) -> MigrateResult<()>;
}

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(0), "$1");
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(2), "$3");
        assert_eq!(SqlDialect::SQLite.parameter_placeholder(2), "?");
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(SqlDialect::PostgreSQL.quote_identifier("my_table"), "\"my_table\"");
        assert_eq!(SqlDialect::SQLite.quote_identifier("my\"table"), "\"my\"\"table\"");

        assert_eq!(
            SqlDialect::PostgreSQL.qualified_table(Some("app"), "tidemark_migrations"),
            "\"app\".\"tidemark_migrations\""
        );
        assert_eq!(
            SqlDialect::SQLite.qualified_table(Some("app"), "tidemark_migrations"),
            "\"tidemark_migrations\""
        );
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(DatabaseValue::Int64(7).as_i64(), Some(7));
        assert_eq!(DatabaseValue::from("42").as_i64(), Some(42));
        assert_eq!(DatabaseValue::Null.as_i64(), None);
        assert!(DatabaseValue::from(Option::<i64>::None).is_null());
        assert!(DatabaseValue::Float64(1.5).into_string("name").is_err());
    }

    #[test]
    fn test_timestamp_text_encodings() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        for text in ["2024-03-01T12:30:00+00:00", "2024-03-01 12:30:00+00:00", "2024-03-01 12:30:00"] {
            assert_eq!(DatabaseValue::from(text).as_datetime(), Some(expected), "{}", text);
        }
        assert_eq!(DatabaseValue::DateTime(expected).as_datetime(), Some(expected));
        assert!(DatabaseValue::from("yesterday").into_datetime("created_at").is_err());
    }
}
