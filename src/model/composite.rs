use crate::model::branch::Branch;
use crate::model::common::BranchKey;

/// One fully resolved selection: a branch from every branch set, in branch set order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeBranch {
    pub(crate) branches: Vec<Branch>,
    pub(crate) keys: Vec<BranchKey>,
    pub(crate) weight: f64,
}

impl CompositeBranch {
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn keys(&self) -> &[BranchKey] {
        &self.keys
    }

    /// Product of the constituent weights, or the correlation weight when one applies.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn contains(&self, key: &BranchKey) -> bool {
        self.keys.contains(key)
    }

    /// Pairs of key and branch in branch set order.
    pub fn iter(&self) -> impl Iterator<Item = (&BranchKey, &Branch)> + '_ {
        self.keys.iter().zip(self.branches.iter())
    }

    /// Branch registry identities joined in branch set order.
    pub fn registry_identity(&self) -> String {
        self.branches
            .iter()
            .map(|b| b.registry_identity())
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl std::fmt::Display for CompositeBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (idx, key) in self.keys.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}
