//! Migrations compiled into the binary with `include_dir`

use include_dir::Dir;

use super::{load_script, sort_catalog, MigrationSource};
use crate::error::{MigrateError, MigrateResult};
use crate::identity::NamingMode;
use crate::migration::Migration;
use crate::sqlparse::SqlParser;

/// Scripts embedded at compile time.
///
/// ```ignore
/// static MIGRATIONS: include_dir::Dir = include_dir::include_dir!("$CARGO_MANIFEST_DIR/migrations");
/// let source = EmbeddedMigrationSource::new(&MIGRATIONS, "");
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedMigrationSource {
    dir: &'static Dir<'static>,
    path: String,
    parser: SqlParser,
}

impl EmbeddedMigrationSource {
    /// `path` selects a subdirectory of `dir`; an empty path means `dir` itself
    pub fn new<P: Into<String>>(dir: &'static Dir<'static>, path: P) -> Self {
        Self {
            dir,
            path: path.into(),
            parser: SqlParser::new(),
        }
    }

    fn root(&self) -> MigrateResult<&'static Dir<'static>> {
        let path = self.path.trim_matches('/');
        if path.is_empty() || path == "." {
            return Ok(self.dir);
        }

        self.dir
            .get_dir(path)
            .ok_or_else(|| MigrateError::Source(format!("Embedded directory '{}' not found", path)))
    }
}

impl MigrationSource for EmbeddedMigrationSource {
    fn find_migrations(&self, naming: NamingMode) -> MigrateResult<Vec<Migration>> {
        let mut migrations = Vec::new();

        for file in self.root()?.files() {
            let Some(name) = file.path().file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let content = file
                .contents_utf8()
                .ok_or_else(|| MigrateError::Source(format!("Embedded migration '{}' is not UTF-8", name)))?;

            if let Some(migration) = load_script(name, content, naming, &self.parser)? {
                migrations.push(migration);
            }
        }

        sort_catalog(migrations)
    }
}
