use thiserror::Error;

/// Which kind of identifier collided in a [`LogicTreeError::Duplicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    BranchSet,
    Branch,
}

impl std::fmt::Display for DuplicateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DuplicateKind::BranchSet => write!(f, "branch set"),
            DuplicateKind::Branch => write!(f, "branch"),
        }
    }
}

/// Errors raised while building or validating a logic tree.
///
/// All of these are data errors: they surface where the malformed input is
/// introduced and always carry the offending identifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LogicTreeError {
    #[error("invalid weight {weight} for branch '{branch}': must be in (0, 1]")]
    InvalidWeight { branch: String, weight: f64 },

    #[error("weights of {scope} sum to {total}, expected 1.0 (delta {delta:e})")]
    WeightSum {
        scope: String,
        total: f64,
        delta: f64,
    },

    #[error("duplicate {kind} '{identifier}'")]
    Duplicate {
        kind: DuplicateKind,
        identifier: String,
    },

    #[error("branches used as primary in more than one correlation: {}", .primaries.join(", "))]
    DuplicatePrimary { primaries: Vec<String> },

    #[error("malformed entry {entry}: {reason}")]
    Format { entry: String, reason: String },

    #[error("{kind} '{identifier}' not found")]
    Lookup {
        kind: &'static str,
        identifier: String,
    },

    #[error("data integrity failure for '{identifier}': {reason}")]
    Integrity { identifier: String, reason: String },

    #[error("composite branch [{composite}] matches more than one correlation primary: {}", .primaries.join(", "))]
    AmbiguousCorrelation {
        composite: String,
        primaries: Vec<String>,
    },

    #[error("failed to parse logic tree record: {0}")]
    Parse(String),
}

impl LogicTreeError {
    pub(crate) fn format(entry: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        LogicTreeError::Format {
            entry: entry.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn integrity(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        LogicTreeError::Integrity {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LogicTreeError {
    fn from(err: serde_json::Error) -> Self {
        LogicTreeError::Parse(err.to_string())
    }
}

pub type Result<T, E = LogicTreeError> = std::result::Result<T, E>;
