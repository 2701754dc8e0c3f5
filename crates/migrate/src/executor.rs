//! Migration Executor - Applies a plan against the database
//!
//! Each plan step runs in its own transaction (unless the script opts out
//! with `notransaction`) together with the ledger update for that step, so a
//! failed step leaves every earlier step committed and nothing of its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::backends::{DatabasePool, DatabaseRow, DatabaseTransaction, DatabaseValue};
use crate::config::MigrationConfig;
use crate::error::{MigrateError, MigrateResult, TxError, TxPhase};
use crate::ledger::{revert_target, AppliedRecord, Ledger};
use crate::migration::{Direction, Migration, PlannedMigration};
use crate::planner::{plan_migrations, AppliedMigration};
use crate::source::MigrationSource;

/// Whether a run executes the scripts or only records them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Execute,
    Skip,
}

/// Where a step's statements go
enum StepExecutor<'a> {
    Direct(&'a dyn DatabasePool),
    Transaction(Box<dyn DatabaseTransaction>),
}

impl StepExecutor<'_> {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<u64> {
        match self {
            StepExecutor::Direct(pool) => pool.execute(sql, params).await,
            StepExecutor::Transaction(tx) => tx.execute(sql, params).await,
        }
    }

    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrateResult<Option<Box<dyn DatabaseRow>>> {
        match self {
            StepExecutor::Direct(pool) => pool.fetch_optional(sql, params).await,
            StepExecutor::Transaction(tx) => tx.fetch_optional(sql, params).await,
        }
    }

    async fn commit(self) -> MigrateResult<()> {
        match self {
            StepExecutor::Direct(_) => Ok(()),
            StepExecutor::Transaction(tx) => tx.commit().await,
        }
    }

    /// Roll back after a failure. A failed rollback is only logged; the
    /// original failure is what gets reported.
    async fn rollback(self, migration: &str) {
        if let StepExecutor::Transaction(tx) = self {
            if let Err(e) = tx.rollback().await {
                warn!("Rollback of migration {} failed: {}", migration, e);
            }
        }
    }
}

/// A catalog migration, or an unknown ledger row, with its application time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub name: String,
    pub applied_at: Option<DateTime<Utc>>,
    /// `false` for ledger rows the catalog no longer contains
    pub in_catalog: bool,
}

/// Runs migrations from a source against one database
pub struct Migrator {
    pool: Arc<dyn DatabasePool>,
    config: MigrationConfig,
    ledger: Ledger,
}

impl Migrator {
    /// Create a migrator with the default configuration
    pub fn new(pool: Arc<dyn DatabasePool>) -> Self {
        let config = MigrationConfig::default();
        let ledger = Ledger::new(pool.dialect(), &config);
        Self { pool, config, ledger }
    }

    /// Create a migrator with custom configuration
    pub fn with_config(pool: Arc<dyn DatabasePool>, config: MigrationConfig) -> MigrateResult<Self> {
        config.validate()?;
        let ledger = Ledger::new(pool.dialect(), &config);
        Ok(Self { pool, config, ledger })
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<dyn DatabasePool> {
        &self.pool
    }

    /// Apply every pending migration in `direction`. Returns the number of
    /// steps committed.
    pub async fn exec<S: MigrationSource + ?Sized>(&self, source: &S, direction: Direction) -> MigrateResult<usize> {
        self.exec_max(source, direction, 0).await
    }

    /// Like [`exec`](Self::exec) with at most `max` direction steps (`0` = no limit).
    pub async fn exec_max<S: MigrationSource + ?Sized>(
        &self,
        source: &S,
        direction: Direction,
        max: usize,
    ) -> MigrateResult<usize> {
        let (catalog, plan) = self.prepare(source, direction, max).await?;
        self.run_plan(&catalog, &plan, RunMode::Execute).await
    }

    /// Compute the plan without touching anything but the tracking table
    pub async fn plan<S: MigrationSource + ?Sized>(
        &self,
        source: &S,
        direction: Direction,
        max: usize,
    ) -> MigrateResult<Vec<PlannedMigration>> {
        let (_, plan) = self.prepare(source, direction, max).await?;
        Ok(plan)
    }

    /// Record up to `max` steps as applied (or reverted) without running them
    pub async fn skip_max<S: MigrationSource + ?Sized>(
        &self,
        source: &S,
        direction: Direction,
        max: usize,
    ) -> MigrateResult<usize> {
        let (catalog, plan) = self.prepare(source, direction, max).await?;
        self.run_plan(&catalog, &plan, RunMode::Skip).await
    }

    /// Ledger rows, ordered by version then name
    pub async fn records(&self) -> MigrateResult<Vec<AppliedRecord>> {
        self.ledger.ensure_table(self.pool.as_ref()).await?;
        self.ledger.records(self.pool.as_ref()).await
    }

    /// Revert and re-apply the most recent migration. Returns its name, or
    /// `None` when nothing is applied.
    pub async fn redo<S: MigrationSource + ?Sized>(&self, source: &S) -> MigrateResult<Option<String>> {
        let plan = self.plan(source, Direction::Down, 1).await?;
        let Some(last) = plan.last() else {
            return Ok(None);
        };
        let name = last.name().to_string();

        self.exec_max(source, Direction::Down, 1).await?;
        self.exec_max(source, Direction::Up, 1).await?;

        info!("Redid migration {}", name);
        Ok(Some(name))
    }

    /// Application state of every catalog migration, followed by ledger rows
    /// the catalog does not know
    pub async fn status<S: MigrationSource + ?Sized>(&self, source: &S) -> MigrateResult<Vec<MigrationStatus>> {
        let naming = self.config.naming;
        let catalog = source.find_migrations(naming)?;
        let records = self.records().await?;

        let mut status: Vec<MigrationStatus> = catalog
            .iter()
            .map(|migration| MigrationStatus {
                name: migration.name.clone(),
                applied_at: records
                    .iter()
                    .find(|record| record.key(naming).covers(&migration.key))
                    .map(|record| record.created_at),
                in_catalog: true,
            })
            .collect();

        status.extend(
            records
                .iter()
                .filter(|record| !catalog.iter().any(|m| record.key(naming).same_slot(&m.key)))
                .map(|record| MigrationStatus {
                    name: record.name.clone(),
                    applied_at: Some(record.created_at),
                    in_catalog: false,
                }),
        );

        Ok(status)
    }

    async fn prepare<S: MigrationSource + ?Sized>(
        &self,
        source: &S,
        direction: Direction,
        max: usize,
    ) -> MigrateResult<(Vec<Migration>, Vec<PlannedMigration>)> {
        let naming = self.config.naming;
        let catalog = source.find_migrations(naming)?;

        let applied: Vec<AppliedMigration> = self
            .records()
            .await?
            .iter()
            .map(|record| record.applied_migration(naming))
            .collect();

        let plan = plan_migrations(&catalog, &applied, direction, max, self.config.ignore_unknown)?;
        Ok((catalog, plan))
    }

    async fn run_plan(&self, catalog: &[Migration], plan: &[PlannedMigration], mode: RunMode) -> MigrateResult<usize> {
        let mut applied = 0;

        for step in plan {
            self.run_step(catalog, step, applied, mode).await?;
            applied += 1;

            match (mode, step.direction) {
                (RunMode::Skip, _) => info!("Skipped migration {} ({})", step.name(), step.direction),
                (RunMode::Execute, Direction::Up) => info!("Applied migration {}", step.name()),
                (RunMode::Execute, Direction::Down) => info!("Reverted migration {}", step.name()),
            }
        }

        if applied > 0 {
            info!("Finished {} migration step(s)", applied);
        } else {
            debug!("No migrations to run");
        }
        Ok(applied)
    }

    async fn run_step(
        &self,
        catalog: &[Migration],
        step: &PlannedMigration,
        applied: usize,
        mode: RunMode,
    ) -> Result<(), TxError> {
        let fail = |phase: TxPhase, cause: MigrateError| TxError::new(step.name(), phase, applied, &cause);

        let mut executor = if mode == RunMode::Skip || !step.disable_transaction {
            let tx = self
                .pool
                .begin_transaction()
                .await
                .map_err(|e| fail(TxPhase::Begin, e))?;
            StepExecutor::Transaction(tx)
        } else {
            StepExecutor::Direct(self.pool.as_ref())
        };

        if mode == RunMode::Execute {
            for query in &step.queries {
                let sql = trim_statement(query);
                if sql.trim().is_empty() {
                    continue;
                }

                debug!("Executing statement for {}: {}", step.name(), sql);
                if let Err(e) = executor.execute(sql, &[]).await {
                    executor.rollback(step.name()).await;
                    return Err(fail(TxPhase::Statement, e));
                }
            }
        }

        if let Err(e) = self.record_step(&mut executor, catalog, step).await {
            executor.rollback(step.name()).await;
            return Err(fail(TxPhase::Ledger, e));
        }

        executor.commit().await.map_err(|e| fail(TxPhase::Commit, e))
    }

    /// Update the ledger for one step according to the step's own direction
    async fn record_step(
        &self,
        executor: &mut StepExecutor<'_>,
        catalog: &[Migration],
        step: &PlannedMigration,
    ) -> MigrateResult<()> {
        let now = Utc::now();
        let migration = &step.migration;

        let statement = match step.direction {
            Direction::Up => {
                let find = self.ledger.find(migration);
                if executor.fetch_optional(&find.sql, &find.params).await?.is_some() {
                    self.ledger.update(migration, now)
                } else {
                    self.ledger.insert(migration, now)
                }
            }
            Direction::Down => match revert_target(catalog, migration, self.config.naming) {
                Some(target) => self.ledger.update(target, now),
                None => self.ledger.delete(migration),
            },
        };

        executor.execute(&statement.sql, &statement.params).await?;
        Ok(())
    }
}

/// Strip trailing whitespace and a single trailing semicolon
fn trim_statement(query: &str) -> &str {
    let trimmed = query.trim_end();
    trimmed.strip_suffix(';').unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_statement() {
        assert_eq!(trim_statement("CREATE TABLE t (id int);\n"), "CREATE TABLE t (id int)");
        assert_eq!(trim_statement("SELECT 1;;  \n"), "SELECT 1;");
        assert_eq!(trim_statement("SELECT 1"), "SELECT 1");
        assert_eq!(trim_statement("  \n"), "");
    }
}
