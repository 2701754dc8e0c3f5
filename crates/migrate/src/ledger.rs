//! Applied-State Ledger - The tracking table of applied migrations
//!
//! In patch mode the table holds one row per version and the row's
//! subversion moves in place as patches are applied or reverted. In legacy
//! mode there is one row per migration name.

use chrono::{DateTime, Utc};

use crate::backends::{DatabasePool, DatabaseRow, DatabaseValue, SqlDialect};
use crate::config::MigrationConfig;
use crate::error::MigrateResult;
use crate::identity::{MigrationKey, NamingMode};
use crate::migration::Migration;
use crate::planner::AppliedMigration;

/// A row of the tracking table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRecord {
    pub version: i64,
    pub subversion: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppliedRecord {
    pub fn from_row(row: &dyn DatabaseRow) -> MigrateResult<Self> {
        Ok(Self {
            version: row.get_by_name("version")?.into_i64("version")?,
            subversion: row.get_by_name("subversion")?.into_i64("subversion")?,
            name: row.get_by_name("name")?.into_string("name")?,
            created_at: row.get_by_name("created_at")?.into_datetime("created_at")?,
            updated_at: row.get_by_name("updated_at")?.into_datetime("updated_at")?,
        })
    }

    pub fn key(&self, naming: NamingMode) -> MigrationKey {
        MigrationKey::from_record(self.version, self.subversion, &self.name, naming)
    }

    /// Planner view of the record
    pub fn applied_migration(&self, naming: NamingMode) -> AppliedMigration {
        AppliedMigration::new(self.key(naming), self.name.clone())
    }
}

/// A statement against the tracking table with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStatement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

/// SQL for the tracking table in one dialect
#[derive(Debug, Clone)]
pub struct Ledger {
    dialect: SqlDialect,
    table: String,
    naming: NamingMode,
}

impl Ledger {
    pub fn new(dialect: SqlDialect, config: &MigrationConfig) -> Self {
        Self {
            dialect,
            table: dialect.qualified_table(config.schema_name.as_deref(), &config.table_name),
            naming: config.naming,
        }
    }

    /// Quoted, schema-qualified table name
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn naming(&self) -> NamingMode {
        self.naming
    }

    fn p(&self, index: usize) -> String {
        self.dialect.parameter_placeholder(index)
    }

    fn slot_column(&self) -> &'static str {
        match self.naming {
            NamingMode::Patch => "version",
            NamingMode::Legacy => "name",
        }
    }

    fn slot_value(&self, migration: &Migration) -> DatabaseValue {
        match self.naming {
            NamingMode::Patch => DatabaseValue::Int64(migration.version()),
            NamingMode::Legacy => DatabaseValue::String(migration.name.clone()),
        }
    }

    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                version BIGINT NOT NULL,\n    \
                subversion BIGINT NOT NULL,\n    \
                name {} NOT NULL,\n    \
                created_at {} NOT NULL,\n    \
                updated_at {} NOT NULL,\n    \
                PRIMARY KEY ({})\n\
            )",
            self.table,
            self.dialect.text_type(),
            self.dialect.timestamp_type(),
            self.dialect.timestamp_type(),
            self.slot_column()
        )
    }

    pub fn select_all_sql(&self) -> String {
        format!(
            "SELECT version, subversion, name, created_at, updated_at FROM {} ORDER BY version, name",
            self.table
        )
    }

    /// Look up the row occupying `migration`'s slot
    pub fn find(&self, migration: &Migration) -> LedgerStatement {
        LedgerStatement {
            sql: format!(
                "SELECT version, subversion, name, created_at, updated_at FROM {} WHERE {} = {}",
                self.table,
                self.slot_column(),
                self.p(0)
            ),
            params: vec![self.slot_value(migration)],
        }
    }

    pub fn insert(&self, migration: &Migration, now: DateTime<Utc>) -> LedgerStatement {
        LedgerStatement {
            sql: format!(
                "INSERT INTO {} (version, subversion, name, created_at, updated_at) VALUES ({}, {}, {}, {}, {})",
                self.table,
                self.p(0),
                self.p(1),
                self.p(2),
                self.p(3),
                self.p(4)
            ),
            params: vec![
                DatabaseValue::Int64(migration.version()),
                DatabaseValue::Int64(migration.subversion()),
                DatabaseValue::String(migration.name.clone()),
                DatabaseValue::DateTime(now),
                DatabaseValue::DateTime(now),
            ],
        }
    }

    /// Move the row in `target`'s slot to `target`'s subversion and name
    pub fn update(&self, target: &Migration, now: DateTime<Utc>) -> LedgerStatement {
        LedgerStatement {
            sql: format!(
                "UPDATE {} SET subversion = {}, name = {}, updated_at = {} WHERE {} = {}",
                self.table,
                self.p(0),
                self.p(1),
                self.p(2),
                self.slot_column(),
                self.p(3)
            ),
            params: vec![
                DatabaseValue::Int64(target.subversion()),
                DatabaseValue::String(target.name.clone()),
                DatabaseValue::DateTime(now),
                self.slot_value(target),
            ],
        }
    }

    pub fn delete(&self, migration: &Migration) -> LedgerStatement {
        LedgerStatement {
            sql: format!("DELETE FROM {} WHERE {} = {}", self.table, self.slot_column(), self.p(0)),
            params: vec![self.slot_value(migration)],
        }
    }

    /// Create the tracking table if it does not exist yet
    pub async fn ensure_table(&self, pool: &dyn DatabasePool) -> MigrateResult<()> {
        pool.execute(&self.create_table_sql(), &[]).await?;
        Ok(())
    }

    /// All rows, ordered by version then name
    pub async fn records(&self, pool: &dyn DatabasePool) -> MigrateResult<Vec<AppliedRecord>> {
        let rows = pool.fetch_all(&self.select_all_sql(), &[]).await?;
        rows.iter().map(|row| AppliedRecord::from_row(row.as_ref())).collect()
    }
}

/// Where the ledger row goes after `reverted` is undone.
///
/// Returns the catalog migration with the greatest subversion of the same
/// version below the reverted one; `None` means the row is deleted. Legacy
/// rows are always deleted.
pub fn revert_target<'a>(catalog: &'a [Migration], reverted: &Migration, naming: NamingMode) -> Option<&'a Migration> {
    if naming == NamingMode::Legacy {
        return None;
    }

    catalog
        .iter()
        .filter(|m| m.version() == reverted.version() && m.subversion() < reverted.subversion())
        .max_by(|a, b| a.order(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(name: &str) -> Migration {
        Migration::new(name, NamingMode::Patch).unwrap()
    }

    #[test]
    fn test_create_table_sql() {
        let ledger = Ledger::new(SqlDialect::SQLite, &MigrationConfig::default());
        let sql = ledger.create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"tidemark_migrations\""));
        assert!(sql.contains("version BIGINT NOT NULL"));
        assert!(sql.contains("created_at TIMESTAMP NOT NULL"));
        assert!(sql.contains("PRIMARY KEY (version)"));

        let config = MigrationConfig::new()
            .with_schema("app")
            .with_naming(NamingMode::Legacy);
        let ledger = Ledger::new(SqlDialect::PostgreSQL, &config);
        let sql = ledger.create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"app\".\"tidemark_migrations\""));
        assert!(sql.contains("TIMESTAMP WITH TIME ZONE"));
        assert!(sql.contains("PRIMARY KEY (name)"));
    }

    #[test]
    fn test_statements_use_dialect_placeholders() {
        let now = Utc::now();
        let migration = patch("0003_01_people.sql");

        let ledger = Ledger::new(SqlDialect::PostgreSQL, &MigrationConfig::default());
        let update = ledger.update(&migration, now);
        assert_eq!(
            update.sql,
            "UPDATE \"tidemark_migrations\" SET subversion = $1, name = $2, updated_at = $3 WHERE version = $4"
        );
        assert_eq!(update.params[0], DatabaseValue::Int64(1));
        assert_eq!(update.params[3], DatabaseValue::Int64(3));

        let ledger = Ledger::new(SqlDialect::SQLite, &MigrationConfig::default());
        let insert = ledger.insert(&migration, now);
        assert!(insert.sql.ends_with("VALUES (?, ?, ?, ?, ?)"));
        assert_eq!(insert.params.len(), 5);

        assert_eq!(ledger.delete(&migration).sql, "DELETE FROM \"tidemark_migrations\" WHERE version = ?");
    }

    #[test]
    fn test_legacy_rows_are_keyed_by_name() {
        let config = MigrationConfig::new().with_naming(NamingMode::Legacy);
        let ledger = Ledger::new(SqlDialect::SQLite, &config);
        let migration = Migration::new("12_people.sql", NamingMode::Legacy).unwrap();

        let delete = ledger.delete(&migration);
        assert_eq!(delete.sql, "DELETE FROM \"tidemark_migrations\" WHERE name = ?");
        assert_eq!(delete.params, vec![DatabaseValue::from("12_people.sql")]);

        let insert = ledger.insert(&migration, Utc::now());
        assert_eq!(insert.params[0], DatabaseValue::Int64(12));
        assert_eq!(insert.params[1], DatabaseValue::Int64(0));
    }

    #[test]
    fn test_escaped_table_name() {
        let config = MigrationConfig::new().with_table("my\"migrations");
        let ledger = Ledger::new(SqlDialect::SQLite, &config);
        assert_eq!(ledger.table(), "\"my\"\"migrations\"");
    }

    #[test]
    fn test_revert_target_steps_down_one_patch() {
        let catalog = vec![
            patch("0001_00_a.sql"),
            patch("0001_01_b.sql"),
            patch("0001_03_c.sql"),
            patch("0002_00_d.sql"),
        ];

        let target = revert_target(&catalog, &catalog[2], NamingMode::Patch).unwrap();
        assert_eq!(target.name, "0001_01_b.sql");

        let target = revert_target(&catalog, &catalog[1], NamingMode::Patch).unwrap();
        assert_eq!(target.name, "0001_00_a.sql");

        assert!(revert_target(&catalog, &catalog[0], NamingMode::Patch).is_none());
        assert!(revert_target(&catalog, &catalog[3], NamingMode::Patch).is_none());
        assert!(revert_target(&catalog, &catalog[2], NamingMode::Legacy).is_none());
    }

    #[test]
    fn test_record_to_planner_view() {
        let now = Utc::now();
        let record = AppliedRecord {
            version: 4,
            subversion: 2,
            name: "0004_02_x.sql".to_string(),
            created_at: now,
            updated_at: now,
        };

        let applied = record.applied_migration(NamingMode::Patch);
        assert_eq!(applied.key, MigrationKey::Patch { version: 4, subversion: 2 });
        assert_eq!(applied.name, "0004_02_x.sql");
    }
}
