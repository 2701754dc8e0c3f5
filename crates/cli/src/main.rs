mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tidemark_migrate::Direction;

use commands::*;

#[derive(Parser)]
#[command(name = "tidemark")]
#[command(about = "Versioned SQL schema migrations")]
#[command(version)]
struct Cli {
    /// Configuration file to use
    #[arg(long, global = true, default_value = "dbconfig.yml")]
    config: PathBuf,

    /// Environment
    #[arg(long, global = true, default_value = "development")]
    env: String,

    /// Log executed statements
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the database to the most recent version available
    Up {
        /// Limit the number of migrations (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// Don't apply migrations, just print them
        #[arg(long)]
        dryrun: bool,
    },

    /// Undo a database migration
    Down {
        /// Limit the number of migrations (0 = unlimited)
        #[arg(long, default_value_t = 1)]
        limit: usize,

        /// Don't apply migrations, just print them
        #[arg(long)]
        dryrun: bool,
    },

    /// Reapply the last migration
    Redo {
        /// Don't apply migrations, just print them
        #[arg(long)]
        dryrun: bool,
    },

    /// Show migration status
    Status,

    /// Set the database level to the most recent version available, without running the migrations
    Skip {
        /// Limit the number of migrations (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },

    /// Create a new migration
    New {
        /// Migration name, e.g. "create people"
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let env = config::load(&cli.config, &cli.env)?;

    match cli.command {
        Commands::Up { limit, dryrun } => {
            apply::run(&env, Direction::Up, limit, dryrun).await?;
        }
        Commands::Down { limit, dryrun } => {
            apply::run(&env, Direction::Down, limit, dryrun).await?;
        }
        Commands::Redo { dryrun } => {
            redo::run(&env, dryrun).await?;
        }
        Commands::Status => {
            status::run(&env).await?;
        }
        Commands::Skip { limit } => {
            skip::run(&env, limit).await?;
        }
        Commands::New { name } => {
            new::run(&env, &name)?;
        }
    }

    Ok(())
}
