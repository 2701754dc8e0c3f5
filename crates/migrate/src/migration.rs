//! Migration Definitions - Core types shared by sources, planner and executor

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{MigrateError, MigrateResult};
use crate::identity::{MigrationKey, NamingMode};
use crate::sqlparse::SqlParser;

/// Direction in which a migration is run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Direction {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            _ => Err(MigrateError::Configuration(format!("Unknown migration direction: {}", s))),
        }
    }
}

/// A named, versioned unit of schema change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Unique identifier, usually the script's file name
    pub name: String,
    /// Ordering key derived from `name`
    pub key: MigrationKey,
    /// Statements applied when migrating up
    pub up: Vec<String>,
    /// Statements applied when migrating down
    pub down: Vec<String>,
    pub disable_transaction_up: bool,
    pub disable_transaction_down: bool,
}

impl Migration {
    /// Create a migration without statements
    pub fn new<N: Into<String>>(name: N, naming: NamingMode) -> MigrateResult<Self> {
        let name = name.into();
        let key = MigrationKey::parse(&name, naming)?;

        Ok(Self {
            name,
            key,
            up: Vec::new(),
            down: Vec::new(),
            disable_transaction_up: false,
            disable_transaction_down: false,
        })
    }

    /// Build a migration from an annotated SQL script
    pub fn from_script(name: &str, content: &str, naming: NamingMode, parser: &SqlParser) -> MigrateResult<Self> {
        let parsed = parser.parse(name, content)?;
        let mut migration = Self::new(name, naming)?;
        migration.up = parsed.up_statements;
        migration.down = parsed.down_statements;
        migration.disable_transaction_up = parsed.disable_transaction_up;
        migration.disable_transaction_down = parsed.disable_transaction_down;
        Ok(migration)
    }

    pub fn with_up<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.up = statements.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_down<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.down = statements.into_iter().map(Into::into).collect();
        self
    }

    pub fn without_transaction(mut self, direction: Direction) -> Self {
        match direction {
            Direction::Up => self.disable_transaction_up = true,
            Direction::Down => self.disable_transaction_down = true,
        }
        self
    }

    pub fn version(&self) -> i64 {
        self.key.version()
    }

    pub fn subversion(&self) -> i64 {
        self.key.subversion()
    }

    /// Statements to run for `direction`
    pub fn statements(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }

    pub fn disable_transaction(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.disable_transaction_up,
            Direction::Down => self.disable_transaction_down,
        }
    }

    /// Catalog order: key first, then name
    pub fn order(&self, other: &Migration) -> Ordering {
        self.key.cmp(&other.key).then_with(|| self.name.cmp(&other.name))
    }
}

/// Sort migrations into catalog order. The sort is stable.
pub fn sort_migrations(migrations: &mut [Migration]) {
    migrations.sort_by(Migration::order);
}

/// One step of a migration plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMigration {
    pub migration: Migration,
    /// Direction of this step; catch-up steps are always `Up`
    pub direction: Direction,
    pub queries: Vec<String>,
    pub disable_transaction: bool,
}

impl PlannedMigration {
    pub fn new(migration: &Migration, direction: Direction) -> Self {
        Self {
            migration: migration.clone(),
            direction,
            queries: migration.statements(direction).to_vec(),
            disable_transaction: migration.disable_transaction(direction),
        }
    }

    pub fn name(&self) -> &str {
        &self.migration.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(name: &str) -> Migration {
        Migration::new(name, NamingMode::Patch).unwrap()
    }

    #[test]
    fn test_sort_patch_migrations() {
        let mut migrations: Vec<Migration> = [
            "0010_00_abc",
            "0120_00_cde",
            "0001_01_cde",
            "0999_00_efg",
            "0001_00_abc",
            "0035_78_cde",
            "0003_00_efg",
            "0004_00_abc",
        ]
        .iter()
        .map(|name| patch(name))
        .collect();

        sort_migrations(&mut migrations);
        let names: Vec<&str> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "0001_00_abc",
                "0001_01_cde",
                "0003_00_efg",
                "0004_00_abc",
                "0010_00_abc",
                "0035_78_cde",
                "0120_00_cde",
                "0999_00_efg"
            ]
        );
    }

    #[test]
    fn test_name_breaks_ties() {
        let a = patch("0001_00_a.sql");
        let b = patch("0001_00_b.sql");
        assert_eq!(a.order(&b), Ordering::Less);
        assert_eq!(b.order(&a), Ordering::Greater);
        assert_eq!(a.order(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn test_planned_step_picks_direction() {
        let migration = patch("0001_00_people.sql")
            .with_up(["CREATE TABLE people (id int)"])
            .with_down(["DROP TABLE people"])
            .without_transaction(Direction::Down);

        let up = PlannedMigration::new(&migration, Direction::Up);
        assert_eq!(up.queries, vec!["CREATE TABLE people (id int)"]);
        assert!(!up.disable_transaction);

        let down = PlannedMigration::new(&migration, Direction::Down);
        assert_eq!(down.queries, vec!["DROP TABLE people"]);
        assert!(down.disable_transaction);
        assert_eq!(down.name(), "0001_00_people.sql");
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("UP".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("down".parse::<Direction>().unwrap(), Direction::Down);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
