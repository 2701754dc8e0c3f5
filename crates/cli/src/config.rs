//! `dbconfig.yml` - Per-environment connection and migration settings
//!
//! ```yaml
//! development:
//!   dialect: sqlite3
//!   datasource: sqlite://dev.db
//!   dir: migrations
//!
//! production:
//!   dialect: postgres
//!   datasource: postgres://app:${DB_PASSWORD}@db/app
//!   schema: app
//!   table: schema_migrations
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use tidemark_migrate::backends::{DatabaseBackendType, DatabasePool, DatabasePoolConfig};
use tidemark_migrate::{FileMigrationSource, MigrationConfig, NamingMode};
use tracing::debug;

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));

fn default_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_patch() -> bool {
    true
}

/// One environment of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Environment {
    /// `postgres` or `sqlite3`
    pub dialect: String,
    pub datasource: String,
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default, rename = "ignoreunknown")]
    pub ignore_unknown: bool,
    /// `<version>_<patch>_<name>` naming; `false` selects legacy naming
    #[serde(default = "default_patch")]
    pub patch: bool,
}

impl Environment {
    pub fn backend_type(&self) -> Result<DatabaseBackendType> {
        Ok(self.dialect.parse::<DatabaseBackendType>()?)
    }

    pub fn naming(&self) -> NamingMode {
        if self.patch {
            NamingMode::Patch
        } else {
            NamingMode::Legacy
        }
    }

    /// Connection URL; a bare SQLite file path is turned into a `sqlite://` URL
    pub fn database_url(&self) -> Result<String> {
        match self.backend_type()? {
            DatabaseBackendType::SQLite if !self.datasource.starts_with("sqlite:") => {
                Ok(format!("sqlite://{}", self.datasource))
            }
            _ => Ok(self.datasource.clone()),
        }
    }

    pub fn migration_config(&self) -> MigrationConfig {
        let mut config = MigrationConfig::new()
            .ignore_unknown(self.ignore_unknown)
            .with_naming(self.naming());
        if let Some(table) = &self.table {
            config = config.with_table(table.clone());
        }
        if let Some(schema) = &self.schema {
            config = config.with_schema(schema.clone());
        }
        config
    }

    pub fn source(&self) -> FileMigrationSource {
        FileMigrationSource::new(self.dir.clone())
    }

    pub async fn connect(&self) -> Result<Arc<dyn DatabasePool>> {
        let url = self.database_url()?;
        let backend = self.backend_type()?.backend();
        debug!("Connecting to {} database", self.dialect);
        backend
            .create_pool(&url, DatabasePoolConfig::default())
            .await
            .with_context(|| format!("Cannot connect to {} database", self.dialect))
    }
}

/// Read `path` and return the settings of environment `name`
pub fn load(path: &Path, name: &str) -> Result<Environment> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read config file {}", path.display()))?;
    parse(&content, name).with_context(|| format!("Could not parse config file {}", path.display()))
}

pub fn parse(content: &str, name: &str) -> Result<Environment> {
    let mut environments: HashMap<String, Environment> = serde_yaml::from_str(content)?;
    let mut env = environments
        .remove(name)
        .ok_or_else(|| anyhow!("No environment: {}", name))?;

    if env.dialect.is_empty() {
        return Err(anyhow!("No dialect specified"));
    }
    if env.datasource.is_empty() {
        return Err(anyhow!("No data source specified"));
    }

    env.datasource = expand_env(&env.datasource);
    Ok(env)
}

/// Replace `$VAR` and `${VAR}` with values from the process environment.
/// Unset variables expand to an empty string.
pub fn expand_env(value: &str) -> String {
    ENV_VAR
        .replace_all(value, |caps: &Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            std::env::var(name).unwrap_or_default()
        })
        .into_owned()
}
