//! Directory-backed migration source

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use super::{is_script, load_script, sort_catalog, MigrationSource};
use crate::error::{MigrateError, MigrateResult};
use crate::identity::{MigrationKey, NamingMode};
use crate::migration::Migration;
use crate::sqlparse::SqlParser;

const TEMPLATE: &str = "-- +migrate Up
-- SQL in section 'Up' is executed when this migration is applied

-- +migrate Down
-- SQL in section 'Down' is executed when this migration is rolled back
";

/// Migrations stored as `.sql` files in one directory (not recursive)
#[derive(Debug, Clone)]
pub struct FileMigrationSource {
    dir: PathBuf,
    parser: SqlParser,
}

impl FileMigrationSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            parser: SqlParser::new(),
        }
    }

    pub fn with_parser(mut self, parser: SqlParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn script_names(&self) -> MigrateResult<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            MigrateError::Source(format!("Failed to read migrations directory {}: {}", self.dir.display(), e))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_script(name) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Write an empty annotated script and return its path.
    ///
    /// Patch naming picks the next free version (`0007_00_<name>.sql`),
    /// legacy naming prefixes a UTC timestamp (`20240301123000-<name>.sql`).
    pub fn create_migration(&self, name: &str, naming: NamingMode) -> MigrateResult<PathBuf> {
        let slug = name.trim().replace(' ', "_").to_lowercase();
        if slug.is_empty() {
            return Err(MigrateError::Configuration("migration name must not be empty".to_string()));
        }

        fs::create_dir_all(&self.dir)?;

        let file_name = match naming {
            NamingMode::Patch => {
                let next = self
                    .script_names()?
                    .iter()
                    .filter_map(|existing| MigrationKey::parse(existing, NamingMode::Patch).ok())
                    .map(|key| key.version())
                    .max()
                    .unwrap_or(0)
                    + 1;
                format!("{:04}_00_{}.sql", next, slug)
            }
            NamingMode::Legacy => format!("{}-{}.sql", Utc::now().format("%Y%m%d%H%M%S"), slug),
        };

        let path = self.dir.join(&file_name);
        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(TEMPLATE.as_bytes())?;

        info!("Created migration {}", path.display());
        Ok(path)
    }
}

impl MigrationSource for FileMigrationSource {
    fn find_migrations(&self, naming: NamingMode) -> MigrateResult<Vec<Migration>> {
        let mut migrations = Vec::new();

        for name in self.script_names()? {
            let content = fs::read_to_string(self.dir.join(&name))?;
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
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_find_migrations_in_directory() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "0002_00_add_email.sql",
            "-- +migrate Up\nALTER TABLE people ADD COLUMN email text;\n-- +migrate Down\n",
        );
        write(
            temp.path(),
            "0001_00_people.sql",
            "-- +migrate Up\nCREATE TABLE people (id int);\n-- +migrate Down\nDROP TABLE people;\n",
        );
        write(temp.path(), "README.md", "not a migration");
        fs::create_dir(temp.path().join("archive.sql")).unwrap();

        let source = FileMigrationSource::new(temp.path());
        let migrations = source.find_migrations(NamingMode::Patch).unwrap();

        let names: Vec<&str> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["0001_00_people.sql", "0002_00_add_email.sql"]);
        assert_eq!(migrations[0].up, vec!["CREATE TABLE people (id int);\n"]);
        assert_eq!(migrations[0].down, vec!["DROP TABLE people;\n"]);
        assert!(migrations[1].down.is_empty());
    }

    #[test]
    fn test_bad_name_fails_in_patch_mode_only() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "init.sql", "-- +migrate Up\nSELECT 1;\n");

        let source = FileMigrationSource::new(temp.path());
        assert!(matches!(
            source.find_migrations(NamingMode::Patch),
            Err(MigrateError::Format { .. })
        ));
        assert_eq!(source.find_migrations(NamingMode::Legacy).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let temp = TempDir::new().unwrap();
        let source = FileMigrationSource::new(temp.path().join("nope"));
        assert!(matches!(
            source.find_migrations(NamingMode::Patch),
            Err(MigrateError::Source(_))
        ));
    }

    #[test]
    fn test_create_migration_picks_next_version() {
        let temp = TempDir::new().unwrap();
        let source = FileMigrationSource::new(temp.path().join("migrations"));

        let first = source.create_migration("Create People", NamingMode::Patch).unwrap();
        assert_eq!(first.file_name().unwrap(), "0001_00_create_people.sql");

        write(source.dir(), "0007_02_patch.sql", "-- +migrate Up\n");
        let next = source.create_migration("add_email", NamingMode::Patch).unwrap();
        assert_eq!(next.file_name().unwrap(), "0008_00_add_email.sql");

        let migrations = source.find_migrations(NamingMode::Patch).unwrap();
        assert_eq!(migrations.len(), 3);
        assert!(migrations.iter().all(|m| m.up.is_empty() && m.down.is_empty()));

        let legacy = source.create_migration("seed", NamingMode::Legacy).unwrap();
        let legacy_name = legacy.file_name().unwrap().to_str().unwrap().to_string();
        assert!(legacy_name.ends_with("-seed.sql"));
        assert_eq!(legacy_name.len(), "20240301123000-seed.sql".len());

        assert!(source.create_migration("  ", NamingMode::Patch).is_err());
    }
}
