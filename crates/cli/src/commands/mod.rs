pub mod apply;
pub mod new;
pub mod redo;
pub mod skip;
pub mod status;

use anyhow::Result;
use tidemark_migrate::{Migrator, PlannedMigration};

use crate::config::Environment;

/// Connect to the environment's database
pub async fn migrator(env: &Environment) -> Result<Migrator> {
    let pool = env.connect().await?;
    Ok(Migrator::with_config(pool, env.migration_config())?)
}

/// Dry-run output for one step
pub fn print_step(step: &PlannedMigration) {
    for line in step_lines(step) {
        println!("{}", line);
    }
}

/// Header plus the statements the step would execute
fn step_lines(step: &PlannedMigration) -> Vec<String> {
    let header = format!("==> Would apply migration {} ({})", step.name(), step.direction);
    std::iter::once(header)
        .chain(step.queries.iter().map(|query| query.trim_end().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tidemark_migrate::{Direction, Migration, NamingMode};
    use tempfile::TempDir;

    fn environment(temp: &TempDir) -> Environment {
        Environment {
            dialect: "sqlite3".to_string(),
            datasource: temp.path().join("app.db").display().to_string(),
            dir: temp.path().join("migrations"),
            table: None,
            schema: None,
            ignore_unknown: false,
            patch: true,
        }
    }

    #[test]
    fn test_step_lines_show_planned_queries() {
        let migration = Migration::new("0003_00_people.sql", NamingMode::Patch)
            .unwrap()
            .with_up(["CREATE TABLE people (id int);\n"])
            .with_down(["DROP TABLE people;"]);

        let down = PlannedMigration::new(&migration, Direction::Down);
        assert_eq!(
            step_lines(&down),
            ["==> Would apply migration 0003_00_people.sql (down)", "DROP TABLE people;"]
        );

        let up = PlannedMigration::new(&migration, Direction::Up);
        assert_eq!(
            step_lines(&up),
            ["==> Would apply migration 0003_00_people.sql (up)", "CREATE TABLE people (id int);"]
        );
    }

    #[tokio::test]
    async fn test_command_flow() {
        let temp = TempDir::new().unwrap();
        let env = environment(&temp);

        let path = new::run(&env, "create people").unwrap();
        assert!(path.ends_with("0001_00_create_people.sql"));
        fs::write(
            &path,
            "-- +migrate Up\nCREATE TABLE people (id int);\n-- +migrate Down\nDROP TABLE people;\n",
        )
        .unwrap();
        let path = new::run(&env, "seed").unwrap();
        fs::write(
            &path,
            "-- +migrate Up\nINSERT INTO people (id) VALUES (1);\n-- +migrate Down\nDELETE FROM people;\n",
        )
        .unwrap();

        assert_eq!(apply::run(&env, Direction::Up, 0, true).await.unwrap(), 2);
        assert_eq!(apply::run(&env, Direction::Up, 1, false).await.unwrap(), 1);
        assert_eq!(skip::run(&env, 0).await.unwrap(), 1);

        let rows = status::run(&env).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.applied_at.is_some()));

        assert_eq!(
            redo::run(&env, false).await.unwrap().as_deref(),
            Some("0002_00_seed.sql")
        );

        assert_eq!(apply::run(&env, Direction::Down, 1, false).await.unwrap(), 1);
        let rows = status::run(&env).await.unwrap();
        assert!(rows[1].applied_at.is_none());
    }

    #[tokio::test]
    async fn test_failed_migration_reports_committed_steps() {
        let temp = TempDir::new().unwrap();
        let env = environment(&temp);

        let path = new::run(&env, "ok").unwrap();
        fs::write(&path, "-- +migrate Up\nCREATE TABLE ok (id int);\n").unwrap();
        let path = new::run(&env, "broken").unwrap();
        fs::write(&path, "-- +migrate Up\nSELECT fail;\n").unwrap();

        let err = apply::run(&env, Direction::Up, 0, false).await.unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("after 1 committed step"), "{}", message);
        assert!(message.contains("0002_00_broken.sql"), "{}", message);
    }
}
