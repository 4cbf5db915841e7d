use serde::{Deserialize, Serialize};

use crate::error::{LogicTreeError, Result};

pub type Id = String;

/// Relative tolerance used for every weight-sum check.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Absolute floor so that comparisons against zero still behave.
const ABSOLUTE_TOLERANCE: f64 = 1e-12;

/// Separator between the branch set short name and branch id in a [`BranchKey`].
pub const KEY_SEPARATOR: char = ':';

/// `isclose`-style comparison with [`WEIGHT_TOLERANCE`].
pub fn is_close(a: f64, b: f64) -> bool {
    let diff = (a - b).abs();
    diff <= (WEIGHT_TOLERANCE * a.abs().max(b.abs())).max(ABSOLUTE_TOLERANCE)
}

/// Fails with [`LogicTreeError::WeightSum`] unless `total` is close to 1.0.
pub fn check_weight_total(scope: impl FnOnce() -> String, total: f64) -> Result<()> {
    if is_close(total, 1.0) {
        Ok(())
    } else {
        Err(LogicTreeError::WeightSum {
            scope: scope(),
            total,
            delta: total - 1.0,
        })
    }
}

/// Fails with [`LogicTreeError::Format`] if `name` contains [`KEY_SEPARATOR`],
/// which the `"<branch_set>:<branch_id>"` encoding cannot represent.
pub(crate) fn check_key_part(what: &str, name: &str) -> Result<()> {
    if name.contains(KEY_SEPARATOR) {
        return Err(LogicTreeError::format(
            format!("'{}'", name),
            format!("{} may not contain '{}'", what, KEY_SEPARATOR),
        ));
    }
    Ok(())
}

/// Stable identity of a branch within a logic tree: its branch set short name
/// plus its branch id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchKey {
    pub branch_set: Id,
    pub branch_id: Id,
}

impl BranchKey {
    pub fn new(branch_set: impl Into<Id>, branch_id: impl Into<Id>) -> Self {
        Self {
            branch_set: branch_set.into(),
            branch_id: branch_id.into(),
        }
    }

    /// Parse the canonical `"<branch_set>:<branch_id>"` encoding.
    pub fn parse(encoded: &str) -> Result<Self> {
        let mut parts = encoded.split(KEY_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(set), Some(id), None) if !set.is_empty() && !id.is_empty() => {
                Ok(Self::new(set, id))
            }
            (_, _, Some(_)) => Err(LogicTreeError::format(
                format!("'{}'", encoded),
                format!("expected exactly one '{}' separator", KEY_SEPARATOR),
            )),
            (_, None, _) => Err(LogicTreeError::format(
                format!("'{}'", encoded),
                format!("missing '{}' separator", KEY_SEPARATOR),
            )),
            _ => Err(LogicTreeError::format(
                format!("'{}'", encoded),
                "branch set and branch id must both be non-empty",
            )),
        }
    }
}

impl std::fmt::Display for BranchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}{}", self.branch_set, KEY_SEPARATOR, self.branch_id)
    }
}
