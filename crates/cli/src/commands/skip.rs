use anyhow::{Context, Result};
use tidemark_migrate::Direction;

use super::migrator;
use crate::config::Environment;

/// Mark pending migrations as applied without running them
pub async fn run(env: &Environment, limit: usize) -> Result<usize> {
    let migrator = migrator(env).await?;

    let skipped = migrator
        .skip_max(&env.source(), Direction::Up, limit)
        .await
        .context("Migration (skip) failed")?;

    println!("Skipped {} migration(s).", skipped);
    Ok(skipped)
}
