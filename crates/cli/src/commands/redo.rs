use anyhow::{Context, Result};
use tidemark_migrate::{Direction, PlannedMigration};

use super::{migrator, print_step};
use crate::config::Environment;

/// Reapply the last migration
pub async fn run(env: &Environment, dryrun: bool) -> Result<Option<String>> {
    let migrator = migrator(env).await?;
    let source = env.source();

    if dryrun {
        let plan = migrator
            .plan(&source, Direction::Down, 1)
            .await
            .context("Migration (redo) failed")?;
        let Some(last) = plan.last() else {
            println!("Nothing to do!");
            return Ok(None);
        };
        print_step(last);
        print_step(&PlannedMigration::new(&last.migration, Direction::Up));
        return Ok(Some(last.name().to_string()));
    }

    let redone = migrator.redo(&source).await.context("Migration (redo) failed")?;
    match &redone {
        Some(name) => println!("Reapplied migration {}.", name),
        None => println!("Nothing to do!"),
    }
    Ok(redone)
}
