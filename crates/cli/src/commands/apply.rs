use anyhow::{Context, Result};
use tidemark_migrate::Direction;

use super::{migrator, print_step};
use crate::config::Environment;

/// Migrate up or down. With `dryrun` only the plan is printed and its
/// length returned.
pub async fn run(env: &Environment, direction: Direction, limit: usize, dryrun: bool) -> Result<usize> {
    let migrator = migrator(env).await?;
    let source = env.source();

    if dryrun {
        let plan = migrator
            .plan(&source, direction, limit)
            .await
            .with_context(|| format!("Cannot plan migration ({})", direction))?;
        for step in &plan {
            print_step(step);
        }
        return Ok(plan.len());
    }

    let applied = match migrator.exec_max(&source, direction, limit).await {
        Ok(applied) => applied,
        Err(e) => {
            let committed = e.applied();
            return Err(anyhow::Error::new(e)
                .context(format!("Migration ({}) failed after {} committed step(s)", direction, committed)));
        }
    };

    match direction {
        Direction::Up => println!("Applied {} migration(s).", applied),
        Direction::Down => println!("Reverted {} migration(s).", applied),
    }
    Ok(applied)
}
