//! Error types for the migration system
//!
//! Every failure surfaces as a [`MigrateError`]. Planning problems and
//! failed steps carry enough context (migration name, phase, committed step
//! count) to diagnose a run without repeating it.

use std::fmt;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A migration name does not follow the required identity pattern
    #[error("Invalid migration name '{name}': {reason}")]
    Format { name: String, reason: String },

    /// A migration script could not be split into up/down statements
    #[error("Error parsing migration '{name}': {message}")]
    Parse { name: String, message: String },

    /// The same migration name was produced twice by one source
    #[error("Duplicate migration name '{0}'")]
    DuplicateMigration(String),

    /// The ledger disagrees with the migration catalog
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A plan step failed while executing
    #[error(transparent)]
    Transaction(#[from] TxError),

    /// Database query error outside of a plan step
    #[error("Database error: {0}")]
    Database(String),

    /// Connection or pool error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Migration source error
    #[error("Migration source error: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Create a new format error
    pub fn format<N: Into<String>, R: ToString>(name: N, reason: R) -> Self {
        Self::Format {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new parse error
    pub fn parse<N: Into<String>, M: ToString>(name: N, message: M) -> Self {
        Self::Parse {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Number of plan steps committed before the failure.
    ///
    /// Only a failed step can leave earlier steps committed, every other
    /// error happens before the first step runs.
    pub fn applied(&self) -> usize {
        match self {
            MigrateError::Transaction(tx) => tx.applied,
            _ => 0,
        }
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        MigrateError::Database(err.to_string())
    }
}

/// A record in the ledger that the current catalog cannot account for
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unable to create migration plan because of {migration}: {problem}")]
pub struct PlanError {
    /// Name of the offending ledger record
    pub migration: String,
    /// Human-readable description of the inconsistency
    pub problem: String,
}

impl PlanError {
    pub fn new<M: Into<String>, P: Into<String>>(migration: M, problem: P) -> Self {
        Self {
            migration: migration.into(),
            problem: problem.into(),
        }
    }
}

/// Stage of a plan step in which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    Begin,
    Statement,
    Ledger,
    Commit,
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxPhase::Begin => write!(f, "begin"),
            TxPhase::Statement => write!(f, "statement"),
            TxPhase::Ledger => write!(f, "ledger update"),
            TxPhase::Commit => write!(f, "commit"),
        }
    }
}

/// A failed plan step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error in migration {migration} during {phase}: {message}")]
pub struct TxError {
    /// Name of the migration whose step failed
    pub migration: String,
    pub phase: TxPhase,
    /// Steps fully committed before this one
    pub applied: usize,
    /// Underlying driver error
    pub message: String,
}

impl TxError {
    pub fn new<M: Into<String>>(migration: M, phase: TxPhase, applied: usize, cause: &MigrateError) -> Self {
        Self {
            migration: migration.into(),
            phase,
            applied,
            message: cause.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = MigrateError::format("abc.sql", "expected <version>_<patch>_<name>");
        assert_eq!(
            err.to_string(),
            "Invalid migration name 'abc.sql': expected <version>_<patch>_<name>"
        );

        let err: MigrateError = PlanError::new("0010_00_add.sql", "unknown migration in database").into();
        assert_eq!(
            err.to_string(),
            "Unable to create migration plan because of 0010_00_add.sql: unknown migration in database"
        );
    }

    #[test]
    fn test_applied_count_only_for_failed_steps() {
        let cause = MigrateError::Database("no such column: fail".to_string());
        let err: MigrateError = TxError::new("0125_00_test.sql", TxPhase::Statement, 2, &cause).into();
        assert_eq!(err.applied(), 2);
        assert!(err.to_string().contains("0125_00_test.sql"));
        assert!(err.to_string().contains("during statement"));
        assert!(err.to_string().contains("no such column: fail"));

        assert_eq!(MigrateError::Connection("refused".into()).applied(), 0);
    }
}
