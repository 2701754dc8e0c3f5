//! Database Backend Abstractions
//!
//! Supports PostgreSQL and SQLite through common traits so the migrator can
//! target either with the same plan.

use std::sync::Arc;

use crate::error::{MigrateError, MigrateResult};

pub mod core;
pub mod postgres;
pub mod sqlite;

pub use self::core::*;
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    SQLite,
}

impl DatabaseBackendType {
    /// Detect database backend type from URL
    pub fn detect(url: &str) -> MigrateResult<Self> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Ok(DatabaseBackendType::PostgreSQL)
        } else if url.starts_with("sqlite:") {
            Ok(DatabaseBackendType::SQLite)
        } else {
            Err(MigrateError::Connection(format!(
                "Unable to detect database backend from URL: {}",
                url
            )))
        }
    }

    pub fn backend(&self) -> Box<dyn DatabaseBackend> {
        match self {
            DatabaseBackendType::PostgreSQL => Box::new(PostgresBackend::new()),
            DatabaseBackendType::SQLite => Box::new(SqliteBackend::new()),
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            "sqlite" | "sqlite3" => Ok(DatabaseBackendType::SQLite),
            _ => Err(MigrateError::Configuration(format!("Unsupported database backend: {}", s))),
        }
    }
}

/// Open a pool for `database_url`, picking the backend from its scheme
pub async fn connect(database_url: &str, config: DatabasePoolConfig) -> MigrateResult<Arc<dyn DatabasePool>> {
    let backend_type = DatabaseBackendType::detect(database_url)?;
    backend_type.backend().create_pool(database_url, config).await
}
