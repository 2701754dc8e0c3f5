//! Migration Configuration
//!
//! Settings are an explicit value owned by each [`Migrator`](crate::Migrator)
//! and read at planning time.

use serde::Deserialize;

use crate::error::{MigrateError, MigrateResult};
use crate::identity::NamingMode;

pub const DEFAULT_TABLE_NAME: &str = "tidemark_migrations";

/// Configuration for the migration system
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Table name for tracking applied migrations
    pub table_name: String,
    /// Schema holding the tracking table, if not the connection default
    pub schema_name: Option<String>,
    /// Plan around ledger records that no longer exist in the catalog
    pub ignore_unknown: bool,
    /// How migration names map to versions
    pub naming: NamingMode,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            schema_name: None,
            ignore_unknown: false,
            naming: NamingMode::Patch,
        }
    }
}

impl MigrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<S: Into<String>>(mut self, table_name: S) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_schema<S: Into<String>>(mut self, schema_name: S) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    pub fn ignore_unknown(mut self, ignore: bool) -> Self {
        self.ignore_unknown = ignore;
        self
    }

    pub fn with_naming(mut self, naming: NamingMode) -> Self {
        self.naming = naming;
        self
    }

    pub fn validate(&self) -> MigrateResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(MigrateError::Configuration("migration table name must not be empty".to_string()));
        }
        if matches!(&self.schema_name, Some(schema) if schema.trim().is_empty()) {
            return Err(MigrateError::Configuration("schema name must not be empty when set".to_string()));
        }
        Ok(())
    }
}
