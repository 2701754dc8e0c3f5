//! Migrations read through a virtual filesystem

use std::collections::BTreeMap;

use super::{load_script, sort_catalog, MigrationSource};
use crate::error::{MigrateError, MigrateResult};
use crate::identity::NamingMode;
use crate::migration::Migration;
use crate::sqlparse::SqlParser;

/// A flat, read-only filesystem
pub trait VirtualFileSystem {
    /// Names of the entries in the root
    fn list(&self) -> MigrateResult<Vec<String>>;

    fn read(&self, name: &str) -> MigrateResult<String>;
}

impl VirtualFileSystem for BTreeMap<String, String> {
    fn list(&self) -> MigrateResult<Vec<String>> {
        Ok(self.keys().cloned().collect())
    }

    fn read(&self, name: &str) -> MigrateResult<String> {
        self.get(name)
            .cloned()
            .ok_or_else(|| MigrateError::Source(format!("File '{}' not found", name)))
    }
}

#[derive(Debug, Clone)]
pub struct VfsMigrationSource<F> {
    fs: F,
    parser: SqlParser,
}

impl<F: VirtualFileSystem> VfsMigrationSource<F> {
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            parser: SqlParser::new(),
        }
    }
}

impl<F: VirtualFileSystem> MigrationSource for VfsMigrationSource<F> {
    fn find_migrations(&self, naming: NamingMode) -> MigrateResult<Vec<Migration>> {
        let mut migrations = Vec::new();

        for name in self.fs.list()? {
            if !super::is_script(&name) {
                continue;
            }
            let content = self.fs.read(&name)?;
            if let Some(migration) = load_script(&name, &content, naming, &self.parser)? {
                migrations.push(migration);
            }
        }

        sort_catalog(migrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_scripts_from_map() {
        let mut files = BTreeMap::new();
        files.insert(
            "0010_00_later.sql".to_string(),
            "-- +migrate Up\nSELECT 10;\n-- +migrate Down\nSELECT -10;\n".to_string(),
        );
        files.insert(
            "0002_00_earlier.sql".to_string(),
            "-- +migrate Up\nSELECT 2;\n".to_string(),
        );
        files.insert("notes.txt".to_string(), "ignored".to_string());

        let migrations = VfsMigrationSource::new(files).find_migrations(NamingMode::Patch).unwrap();
        let names: Vec<&str> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["0002_00_earlier.sql", "0010_00_later.sql"]);
        assert_eq!(migrations[1].down, vec!["SELECT -10;\n"]);
    }

    #[test]
    fn test_parse_errors_surface() {
        let mut files = BTreeMap::new();
        files.insert("0001_00_bad.sql".to_string(), "SELECT 1;\n".to_string());

        let err = VfsMigrationSource::new(files).find_migrations(NamingMode::Patch).unwrap_err();
        assert!(matches!(err, MigrateError::Parse { .. }));
    }
}
