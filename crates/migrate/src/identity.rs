//! Migration Identity - Name parsing and the total order over migrations
//!
//! A migration's position in the catalog is derived from its name. Patch
//! mode reads a `<version>_<subversion>_<rest>` prefix; legacy mode orders by
//! an optional leading number and falls back to the plain name.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, MigrateResult};

static PATCH_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)_(\d+)_.+$").expect("valid regex"));
static NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)").expect("valid regex"));

/// Identity scheme used to derive keys from migration names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingMode {
    /// `<version>_<subversion>_<name>`, names that do not match are rejected
    #[default]
    Patch,
    /// Optional numeric prefix, then lexical order by name
    Legacy,
}

/// Sortable identity of a migration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MigrationKey {
    Patch { version: i64, subversion: i64 },
    Legacy { number: Option<i64>, name: String },
}

impl MigrationKey {
    /// Derive the key of a migration from its name
    pub fn parse(name: &str, naming: NamingMode) -> MigrateResult<Self> {
        match naming {
            NamingMode::Patch => Self::parse_patch(name),
            NamingMode::Legacy => Ok(Self::legacy(name)),
        }
    }

    fn parse_patch(name: &str) -> MigrateResult<Self> {
        let captures = PATCH_NAME
            .captures(name)
            .ok_or_else(|| MigrateError::format(name, "expected format <version>_<patch>_<name>.sql, e.g. 0001_00_init.sql"))?;

        let version = captures[1]
            .parse::<i64>()
            .map_err(|e| MigrateError::format(name, format!("could not parse version {:?}: {}", &captures[1], e)))?;
        let subversion = captures[2]
            .parse::<i64>()
            .map_err(|e| MigrateError::format(name, format!("could not parse patch {:?}: {}", &captures[2], e)))?;

        Ok(MigrationKey::Patch { version, subversion })
    }

    fn legacy(name: &str) -> Self {
        // A prefix too large for i64 orders like an unnumbered name.
        let number = NUMBER_PREFIX
            .captures(name)
            .and_then(|captures| captures[1].parse::<i64>().ok());

        MigrationKey::Legacy {
            number,
            name: name.to_string(),
        }
    }

    /// Rebuild the key of a ledger row
    pub fn from_record(version: i64, subversion: i64, name: &str, naming: NamingMode) -> Self {
        match naming {
            NamingMode::Patch => MigrationKey::Patch { version, subversion },
            NamingMode::Legacy => Self::legacy(name),
        }
    }

    /// Primary ordering number (the numeric prefix in legacy mode, 0 if none)
    pub fn version(&self) -> i64 {
        match self {
            MigrationKey::Patch { version, .. } => *version,
            MigrationKey::Legacy { number, .. } => number.unwrap_or(0),
        }
    }

    pub fn subversion(&self) -> i64 {
        match self {
            MigrationKey::Patch { subversion, .. } => *subversion,
            MigrationKey::Legacy { .. } => 0,
        }
    }

    /// Whether both keys map to the same ledger row
    pub fn same_slot(&self, other: &MigrationKey) -> bool {
        match (self, other) {
            (MigrationKey::Patch { version: a, .. }, MigrationKey::Patch { version: b, .. }) => a == b,
            (MigrationKey::Legacy { name: a, .. }, MigrationKey::Legacy { name: b, .. }) => a == b,
            _ => false,
        }
    }

    /// Whether an applied key already accounts for `other`.
    ///
    /// A ledger row at a subversion covers every lower subversion of the
    /// same version.
    pub fn covers(&self, other: &MigrationKey) -> bool {
        match (self, other) {
            (
                MigrationKey::Patch { version: a, subversion: applied },
                MigrationKey::Patch { version: b, subversion: wanted },
            ) => a == b && applied >= wanted,
            (MigrationKey::Legacy { name: a, .. }, MigrationKey::Legacy { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Ord for MigrationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                MigrationKey::Patch { version: va, subversion: sa },
                MigrationKey::Patch { version: vb, subversion: sb },
            ) => va.cmp(vb).then(sa.cmp(sb)),
            (
                MigrationKey::Legacy { number: na, name: a },
                MigrationKey::Legacy { number: nb, name: b },
            ) => match (na, nb) {
                (Some(x), Some(y)) if x != y => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                _ => a.cmp(b),
            },
            (MigrationKey::Patch { .. }, MigrationKey::Legacy { .. }) => Ordering::Less,
            (MigrationKey::Legacy { .. }, MigrationKey::Patch { .. }) => Ordering::Greater,
        }
    }
}

impl PartialOrd for MigrationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationKey::Patch { version, subversion } => write!(f, "{}.{}", version, subversion),
            MigrationKey::Legacy { name, .. } => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(version: i64, subversion: i64) -> MigrationKey {
        MigrationKey::Patch { version, subversion }
    }

    #[test]
    fn test_parse_patch_name() {
        let key = MigrationKey::parse("0035_78_cde.sql", NamingMode::Patch).unwrap();
        assert_eq!(key, patch(35, 78));
        assert_eq!(key.version(), 35);
        assert_eq!(key.subversion(), 78);
    }

    #[test]
    fn test_parse_rejects_bad_names_in_patch_mode() {
        for name in ["abc.sql", "0001_init.sql", "0001_00_", "_00_x.sql", "v1_00_x.sql"] {
            let err = MigrationKey::parse(name, NamingMode::Patch).unwrap_err();
            assert!(matches!(err, MigrateError::Format { .. }), "{} should be rejected", name);
        }

        let err = MigrationKey::parse("99999999999999999999_00_big.sql", NamingMode::Patch).unwrap_err();
        assert!(err.to_string().contains("could not parse version"));
    }

    #[test]
    fn test_numeric_not_lexical_order() {
        let a = MigrationKey::parse("0002_00_a.sql", NamingMode::Patch).unwrap();
        let b = MigrationKey::parse("0010_00_b.sql", NamingMode::Patch).unwrap();
        assert!(a < b);

        let a = MigrationKey::parse("2_00_a.sql", NamingMode::Patch).unwrap();
        let b = MigrationKey::parse("10_00_b.sql", NamingMode::Patch).unwrap();
        assert!(a < b);

        assert!(patch(20160126, 1100) < patch(20160126, 1200));
        assert!(patch(1, 0) < patch(2, 0));
        assert!(!(patch(2, 0) < patch(2, 0)));
    }

    #[test]
    fn test_legacy_order() {
        let mut keys: Vec<MigrationKey> = ["10_abc", "120_cde", "1_abc", "efg", "2_cde", "35_cde", "3_efg", "4_abc"]
            .iter()
            .map(|name| MigrationKey::parse(name, NamingMode::Legacy).unwrap())
            .collect();
        keys.sort();

        let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, ["1_abc", "2_cde", "3_efg", "4_abc", "10_abc", "35_cde", "120_cde", "efg"]);

        let a = MigrationKey::parse("1-a", NamingMode::Legacy).unwrap();
        let b = MigrationKey::parse("1-b", NamingMode::Legacy).unwrap();
        assert!(a < b);
        let one = MigrationKey::parse("1", NamingMode::Legacy).unwrap();
        let ten = MigrationKey::parse("10", NamingMode::Legacy).unwrap();
        assert!(one < ten);
    }

    #[test]
    fn test_slot_and_cover() {
        assert!(patch(1, 2).same_slot(&patch(1, 0)));
        assert!(!patch(1, 2).same_slot(&patch(2, 2)));

        assert!(patch(1, 2).covers(&patch(1, 1)));
        assert!(patch(1, 2).covers(&patch(1, 2)));
        assert!(!patch(1, 1).covers(&patch(1, 2)));
        assert!(!patch(2, 5).covers(&patch(1, 0)));

        let a = MigrationKey::parse("abc", NamingMode::Legacy).unwrap();
        let b = MigrationKey::parse("cde", NamingMode::Legacy).unwrap();
        assert!(a.covers(&a.clone()));
        assert!(!a.covers(&b));
    }

    #[test]
    fn test_from_record() {
        assert_eq!(MigrationKey::from_record(3, 1, "0003_01_x.sql", NamingMode::Patch), patch(3, 1));
        assert_eq!(
            MigrationKey::from_record(0, 0, "12_people.sql", NamingMode::Legacy),
            MigrationKey::Legacy {
                number: Some(12),
                name: "12_people.sql".to_string()
            }
        );
    }
}
