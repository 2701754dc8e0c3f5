//! In-memory migration source

use super::{sort_catalog, MigrationSource};
use crate::error::MigrateResult;
use crate::identity::{MigrationKey, NamingMode};
use crate::migration::Migration;

/// A fixed list of migrations built in code
#[derive(Debug, Clone, Default)]
pub struct MemoryMigrationSource {
    pub migrations: Vec<Migration>,
}

impl MemoryMigrationSource {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self { migrations }
    }

    pub fn push(&mut self, migration: Migration) {
        self.migrations.push(migration);
    }
}

impl MigrationSource for MemoryMigrationSource {
    /// Keys are re-derived under `naming`, so a list built for one mode can
    /// be read in the other. The stored list is left untouched.
    fn find_migrations(&self, naming: NamingMode) -> MigrateResult<Vec<Migration>> {
        let migrations = self
            .migrations
            .iter()
            .map(|migration| {
                Ok(Migration {
                    key: MigrationKey::parse(&migration.name, naming)?,
                    ..migration.clone()
                })
            })
            .collect::<MigrateResult<Vec<_>>>()?;

        sort_catalog(migrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;

    #[test]
    fn test_returns_sorted_copy() {
        let source = MemoryMigrationSource::new(vec![
            Migration::new("0002_00_b", NamingMode::Patch).unwrap(),
            Migration::new("0001_00_a", NamingMode::Patch).unwrap(),
        ]);

        let migrations = source.find_migrations(NamingMode::Patch).unwrap();
        assert_eq!(migrations[0].name, "0001_00_a");
        assert_eq!(source.migrations[0].name, "0002_00_b");
    }

    #[test]
    fn test_keys_follow_requested_mode() {
        let mut source = MemoryMigrationSource::default();
        source.push(Migration::new("10_abc", NamingMode::Legacy).unwrap());
        source.push(Migration::new("2_cde", NamingMode::Legacy).unwrap());

        let migrations = source.find_migrations(NamingMode::Legacy).unwrap();
        assert_eq!(migrations[0].name, "2_cde");

        assert!(matches!(
            source.find_migrations(NamingMode::Patch),
            Err(MigrateError::Format { .. })
        ));
    }
}
