use log::{error, info};
use std::collections::HashSet;

use crate::error::{DuplicateKind, LogicTreeError, Result};
use crate::logic::combine::{
    compose, raw_combination_count, validate_composition, CompositionSummary,
};
use crate::model::branch::{Branch, BranchKind};
use crate::model::branch_set::BranchSet;
use crate::model::common::BranchKey;
use crate::model::composite::CompositeBranch;
use crate::model::correlation::{CorrelatedBranch, LogicTreeCorrelations};

/// Branch sets plus the correlations between them.
///
/// Construction and [`LogicTree::set_correlations`] both run the composition
/// engine to completion, so a `LogicTree` always satisfies the global weight
/// closure and [`LogicTree::combined_branches`] cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicTree {
    title: String,
    version: String,
    branch_sets: Vec<BranchSet>,
    correlations: LogicTreeCorrelations,
}

impl LogicTree {
    pub fn new(
        title: impl Into<String>,
        version: impl Into<String>,
        branch_sets: Vec<BranchSet>,
        correlations: LogicTreeCorrelations,
    ) -> Result<Self> {
        let tree = Self {
            title: title.into(),
            version: version.into(),
            branch_sets,
            correlations,
        };

        tree.check_branch_sets()?;
        tree.check_sources()?;
        let summary = tree.check_correlations(&tree.correlations)?;

        info!(
            "Logic tree '{}' v{}: {} branch sets, {} correlations, {} composite branches",
            tree.title,
            tree.version,
            tree.branch_sets.len(),
            tree.correlations.len(),
            summary.composite_branches
        );
        Ok(tree)
    }

    fn check_branch_sets(&self) -> Result<()> {
        let mut names = HashSet::new();
        for branch_set in &self.branch_sets {
            if !names.insert(branch_set.short_name()) {
                return Err(LogicTreeError::Duplicate {
                    kind: DuplicateKind::BranchSet,
                    identifier: branch_set.short_name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Every source branch must carry at least one source.
    fn check_sources(&self) -> Result<()> {
        for (key, branch) in self.branches() {
            if let Branch::Source(source) = branch {
                if source.sources().is_empty() {
                    return Err(LogicTreeError::integrity(
                        key.to_string(),
                        "source branch has no inversion or distributed sources",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Correlated branches must exist in this tree and the composite weights
    /// must still sum to 1 once the correlations apply.
    fn check_correlations(
        &self,
        correlations: &LogicTreeCorrelations,
    ) -> Result<CompositionSummary> {
        for correlation in correlations {
            let correlated_branches =
                std::iter::once(correlation.primary()).chain(correlation.associated());
            for correlated in correlated_branches {
                let resolved =
                    CorrelatedBranch::resolve(correlated.key.clone(), &self.branch_sets)?;
                if resolved.branch != correlated.branch {
                    return Err(LogicTreeError::integrity(
                        correlated.key.to_string(),
                        "correlated branch differs from the branch in the logic tree",
                    ));
                }
            }
        }
        validate_composition(&self.title, &self.branch_sets, correlations)
    }

    /// Replace the correlations, validating the tree again. On failure the
    /// previous correlations are kept.
    pub fn set_correlations(&mut self, correlations: LogicTreeCorrelations) -> Result<()> {
        let summary = self.check_correlations(&correlations)?;
        info!(
            "Logic tree '{}': {} correlations now yield {} composite branches",
            self.title,
            correlations.len(),
            summary.composite_branches
        );
        self.correlations = correlations;
        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn branch_sets(&self) -> &[BranchSet] {
        &self.branch_sets
    }

    pub fn correlations(&self) -> &LogicTreeCorrelations {
        &self.correlations
    }

    /// Kind shared by every branch, if the tree has any.
    pub fn kind(&self) -> Option<BranchKind> {
        self.branch_sets.iter().find_map(|bs| bs.kind())
    }

    pub fn branch_set(&self, short_name: &str) -> Option<&BranchSet> {
        self.branch_sets.iter().find(|bs| bs.short_name() == short_name)
    }

    pub fn find_branch(&self, key: &BranchKey) -> Option<&Branch> {
        self.branch_set(&key.branch_set)
            .and_then(|bs| bs.get_branch(&key.branch_id))
    }

    /// Every branch with its key, in branch set order.
    pub fn branches(&self) -> impl Iterator<Item = (BranchKey, &Branch)> + '_ {
        self.branch_sets.iter().flat_map(|bs| {
            bs.branches()
                .iter()
                .map(move |b| (BranchKey::new(bs.short_name(), b.branch_id()), b))
        })
    }

    pub fn raw_combination_count(&self) -> usize {
        raw_combination_count(&self.branch_sets)
    }

    /// Correlation-adjusted composite branches. Each call starts a fresh enumeration.
    pub fn combined_branches(&self) -> impl Iterator<Item = CompositeBranch> + '_ {
        // validated on construction and on every correlation change
        compose(&self.branch_sets, &self.correlations).filter_map(|c| match c {
            Ok(composite) => Some(composite),
            Err(e) => {
                debug_assert!(false, "validated logic tree failed to compose: {}", e);
                error!("Logic tree '{}' failed to compose: {}", self.title, e);
                None
            }
        })
    }

    pub fn summary(&self) -> Result<CompositionSummary> {
        validate_composition(&self.title, &self.branch_sets, &self.correlations)
    }
}
