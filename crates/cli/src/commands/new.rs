use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::Environment;

/// Create an empty migration script in the environment's directory
pub fn run(env: &Environment, name: &str) -> Result<PathBuf> {
    let path = env
        .source()
        .create_migration(name, env.naming())
        .with_context(|| format!("Could not create migration {}", name))?;

    println!("Created migration {}", path.display());
    Ok(path)
}
