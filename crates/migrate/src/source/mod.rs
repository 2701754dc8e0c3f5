//! Migration Sources - Where the catalog of migrations comes from
//!
//! A source turns some storage (a directory, files compiled into the binary,
//! an in-memory list, a virtual filesystem) into a sorted catalog.

use crate::error::{MigrateError, MigrateResult};
use crate::identity::NamingMode;
use crate::migration::{sort_migrations, Migration};
use crate::sqlparse::SqlParser;

mod embedded;
mod file;
mod memory;
mod vfs;

pub use embedded::EmbeddedMigrationSource;
pub use file::FileMigrationSource;
pub use memory::MemoryMigrationSource;
pub use vfs::{VfsMigrationSource, VirtualFileSystem};

const SCRIPT_EXTENSION: &str = ".sql";

/// A provider of migrations
pub trait MigrationSource {
    /// Return the catalog in sorted order, keys derived under `naming`
    fn find_migrations(&self, naming: NamingMode) -> MigrateResult<Vec<Migration>>;
}

impl<S: MigrationSource + ?Sized> MigrationSource for &S {
    fn find_migrations(&self, naming: NamingMode) -> MigrateResult<Vec<Migration>> {
        (**self).find_migrations(naming)
    }
}

/// Whether a directory entry is a migration script
pub(crate) fn is_script(name: &str) -> bool {
    name.ends_with(SCRIPT_EXTENSION)
}

/// Build a migration from a script, or `None` for entries that are not scripts
pub(crate) fn load_script(
    name: &str,
    content: &str,
    naming: NamingMode,
    parser: &SqlParser,
) -> MigrateResult<Option<Migration>> {
    if !is_script(name) {
        return Ok(None);
    }
    Migration::from_script(name, content, naming, parser).map(Some)
}

/// Sort a catalog and reject names that occur twice
pub fn sort_catalog(mut migrations: Vec<Migration>) -> MigrateResult<Vec<Migration>> {
    sort_migrations(&mut migrations);

    if let Some(pair) = migrations.windows(2).find(|pair| pair[0].name == pair[1].name) {
        return Err(MigrateError::DuplicateMigration(pair[0].name.clone()));
    }

    Ok(migrations)
}
