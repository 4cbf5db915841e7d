use log::debug;
use std::collections::HashSet;

use crate::error::{DuplicateKind, LogicTreeError, Result};
use crate::model::attribute::BranchAttributeSpec;
use crate::model::branch::{Branch, BranchKind, BranchOverrides};
use crate::model::common::{check_key_part, check_weight_total, Id};

/// A named group of mutually exclusive branches whose weights sum to 1.
///
/// Validated on construction; filtering or reweighting goes through
/// [`BranchSet::rebuild_with`] which validates the new set again.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSet {
    short_name: Id,
    long_name: String,
    branches: Vec<Branch>,
}

impl BranchSet {
    pub fn new(
        short_name: impl Into<Id>,
        long_name: impl Into<String>,
        branches: Vec<Branch>,
    ) -> Result<Self> {
        let branch_set = Self {
            short_name: short_name.into(),
            long_name: long_name.into(),
            branches,
        };
        branch_set.validate()?;
        debug!(
            "Built branch set '{}' with {} branches",
            branch_set.short_name,
            branch_set.branches.len()
        );
        Ok(branch_set)
    }

    fn validate(&self) -> Result<()> {
        check_key_part("branch set short name", &self.short_name)?;
        if self.branches.is_empty() {
            return Ok(());
        }

        let mut ids = HashSet::new();
        for branch in &self.branches {
            if !ids.insert(branch.branch_id()) {
                return Err(LogicTreeError::Duplicate {
                    kind: DuplicateKind::Branch,
                    identifier: format!("{}:{}", self.short_name, branch.branch_id()),
                });
            }
        }

        let first = &self.branches[0];
        let kind = first.kind();
        let trts = first.tectonic_region_types();
        for branch in &self.branches[1..] {
            if branch.kind() != kind {
                return Err(LogicTreeError::integrity(
                    format!("{}:{}", self.short_name, branch.branch_id()),
                    format!("{} branch in a {} branch set", branch.kind(), kind),
                ));
            }
            if branch.tectonic_region_types() != trts {
                return Err(LogicTreeError::integrity(
                    format!("{}:{}", self.short_name, branch.branch_id()),
                    format!(
                        "tectonic region types {:?} differ from sibling branches {:?}",
                        branch.tectonic_region_types(),
                        trts
                    ),
                ));
            }
        }

        let total: f64 = self.branches.iter().map(|b| b.weight()).sum();
        check_weight_total(|| format!("branch set '{}'", self.short_name), total)
    }

    /// New branch set with the same names and `branches` in place of the current ones.
    pub fn rebuild_with(&self, branches: Vec<Branch>) -> Result<Self> {
        Self::new(self.short_name.clone(), self.long_name.clone(), branches)
    }

    /// Rescale the weights of `branches` so they sum to 1.
    pub fn renormalized(branches: &[Branch]) -> Result<Vec<Branch>> {
        let total: f64 = branches.iter().map(|b| b.weight()).sum();
        branches
            .iter()
            .map(|b| b.rebuild(BranchOverrides::weight(b.weight() / total)))
            .collect()
    }

    /// New branch set holding only the branches matching `predicate`, reweighted to sum to 1.
    pub fn filtered<F>(&self, predicate: F) -> Result<Self>
    where
        F: Fn(&Branch) -> bool,
    {
        let kept: Vec<Branch> = self.branches.iter().filter(|b| predicate(b)).cloned().collect();
        self.rebuild_with(Self::renormalized(&kept)?)
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn kind(&self) -> Option<BranchKind> {
        self.branches.first().map(|b| b.kind())
    }

    pub fn get_branch(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.branch_id() == branch_id)
    }

    /// Attribute specs derived from the values of every branch.
    pub fn attribute_specs(&self) -> Vec<BranchAttributeSpec> {
        BranchAttributeSpec::derive_from(self.branches.iter().flat_map(|b| b.values()))
    }
}
