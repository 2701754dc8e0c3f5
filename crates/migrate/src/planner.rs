//! Migration Planner - Decides which migrations to run and in what order
//!
//! Planning is a pure function of the catalog, the applied ledger, the
//! requested direction and a step limit. Ledger gaps below the high-water
//! mark (e.g. a lower-numbered migration merged after a later one was
//! applied) are closed first with `Up` steps, then the requested direction's
//! own steps follow.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::error::PlanError;
use crate::identity::MigrationKey;
use crate::migration::{sort_migrations, Direction, Migration, PlannedMigration};

/// A ledger row reduced to what planning needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub key: MigrationKey,
    pub name: String,
}

impl AppliedMigration {
    pub fn new<N: Into<String>>(key: MigrationKey, name: N) -> Self {
        Self { key, name: name.into() }
    }

    /// Position of `migration` relative to this record in catalog order
    /// (key, then name)
    fn locate(&self, migration: &Migration) -> Ordering {
        migration
            .key
            .cmp(&self.key)
            .then_with(|| migration.name.as_str().cmp(&self.name))
    }
}

/// Compute the ordered steps that move the ledger in `direction`.
///
/// `max` limits the direction's own steps; `0` means no limit. Catch-up
/// steps are never limited.
pub fn plan_migrations(
    catalog: &[Migration],
    applied: &[AppliedMigration],
    direction: Direction,
    max: usize,
    ignore_unknown: bool,
) -> Result<Vec<PlannedMigration>, PlanError> {
    let mut migrations = catalog.to_vec();
    sort_migrations(&mut migrations);

    let mut existing: Vec<&AppliedMigration> = applied.iter().collect();
    existing.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.name.cmp(&b.name)));

    let is_known = |record: &AppliedMigration| migrations.iter().any(|m| m.key.same_slot(&record.key));

    if ignore_unknown {
        existing.retain(|record| {
            let known = is_known(record);
            if !known {
                warn!("Ignoring unknown migration in database: {}", record.name);
            }
            known
        });
    } else if let Some(unknown) = existing.iter().find(|record| !is_known(record)) {
        return Err(PlanError::new(unknown.name.clone(), "unknown migration in database"));
    }

    let current = existing.last().copied();

    let mut plan = match current {
        Some(current) => to_catch_up(&migrations, &existing, current),
        None => Vec::new(),
    };
    let catch_up = plan.len();

    let mut pending = to_apply(&migrations, current, direction);
    if max > 0 {
        pending.truncate(max);
    }
    plan.extend(pending.into_iter().map(|m| PlannedMigration::new(m, direction)));

    debug!(
        "Planned {} migration(s) {} ({} catch-up)",
        plan.len(),
        direction,
        catch_up
    );

    Ok(plan)
}

/// Catalog migrations the direction pass would consider, in execution order.
///
/// `migrations` must already be sorted.
pub fn to_apply<'a>(
    migrations: &'a [Migration],
    current: Option<&AppliedMigration>,
    direction: Direction,
) -> Vec<&'a Migration> {
    match (direction, current) {
        (Direction::Up, None) => migrations.iter().collect(),
        (Direction::Up, Some(current)) => migrations
            .iter()
            .filter(|m| current.locate(m) == Ordering::Greater)
            .collect(),
        (Direction::Down, None) => Vec::new(),
        (Direction::Down, Some(current)) => migrations
            .iter()
            .rev()
            .filter(|m| current.locate(m) != Ordering::Greater)
            .collect(),
    }
}

/// Migrations below the high-water mark that the ledger does not cover
pub fn to_catch_up(
    migrations: &[Migration],
    existing: &[&AppliedMigration],
    current: &AppliedMigration,
) -> Vec<PlannedMigration> {
    migrations
        .iter()
        .filter(|m| current.locate(m) == Ordering::Less)
        .filter(|m| !existing.iter().any(|record| record.key.covers(&m.key)))
        .map(|m| PlannedMigration::new(m, Direction::Up))
        .collect()
}
