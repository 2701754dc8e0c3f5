//! # tidemark-migrate
//!
//! Versioned SQL schema migrations. Migrations come from a [`MigrationSource`],
//! the tracking table records which versions are applied, and the
//! [`Migrator`] plans and executes the steps that move the database up or
//! down.
//!
//! ```ignore
//! use tidemark_migrate::{backends::SqliteBackend, Direction, FileMigrationSource, Migrator};
//!
//! let pool = SqliteBackend::in_memory().await?;
//! let migrator = Migrator::new(pool);
//! let applied = migrator.exec(&FileMigrationSource::new("migrations"), Direction::Up).await?;
//! ```
//!
//! Migration names follow `<version>_<patch>_<name>.sql` by default. Applying
//! `0003_01_x.sql` after `0003_00_y.sql` moves the ledger row for version 3
//! to patch 1 instead of adding a second row. [`NamingMode::Legacy`] orders
//! by an optional numeric prefix and keeps one row per name.

pub mod backends;
pub mod config;
pub mod error;
pub mod executor;
pub mod identity;
pub mod ledger;
pub mod migration;
pub mod planner;
pub mod source;
pub mod sqlparse;

pub use config::{MigrationConfig, DEFAULT_TABLE_NAME};
pub use error::{MigrateError, MigrateResult, PlanError, TxError, TxPhase};
pub use executor::{MigrationStatus, Migrator};
pub use identity::{MigrationKey, NamingMode};
pub use ledger::AppliedRecord;
pub use migration::{Direction, Migration, PlannedMigration};
pub use planner::{plan_migrations, AppliedMigration};
pub use source::{
    EmbeddedMigrationSource, FileMigrationSource, MemoryMigrationSource, MigrationSource, VfsMigrationSource,
    VirtualFileSystem,
};
pub use sqlparse::{parse_migration, ParsedMigration, SqlParser};
