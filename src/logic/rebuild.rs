use log::debug;

use crate::error::{LogicTreeError, Result};
use crate::model::{Branch, BranchKey, BranchSet, LogicTree, LogicTreeCorrelations};

/// Identifying fields of the branch set owning a filtered branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSetContext {
    pub short_name: String,
    pub long_name: String,
}

/// Identifying fields of the logic tree owning a filtered branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicTreeContext {
    pub title: String,
    pub version: String,
}

/// A branch paired with enough of its branch set and logic tree to rebuild
/// a new tree from a filtered subset.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredBranch {
    pub branch: Branch,
    pub branch_set: BranchSetContext,
    pub logic_tree: LogicTreeContext,
}

impl FilteredBranch {
    pub fn key(&self) -> BranchKey {
        BranchKey::new(self.branch_set.short_name.clone(), self.branch.branch_id())
    }
}

impl LogicTree {
    /// Flattened view of every branch with its owning contexts.
    pub fn filtered_branches(&self) -> impl Iterator<Item = FilteredBranch> + '_ {
        let logic_tree = LogicTreeContext {
            title: self.title().to_string(),
            version: self.version().to_string(),
        };
        self.branch_sets().iter().flat_map(move |bs| {
            let branch_set = BranchSetContext {
                short_name: bs.short_name().to_string(),
                long_name: bs.long_name().to_string(),
            };
            let logic_tree = logic_tree.clone();
            bs.branches().iter().map(move |b| FilteredBranch {
                branch: b.clone(),
                branch_set: branch_set.clone(),
                logic_tree: logic_tree.clone(),
            })
        })
    }

    /// Build a tree from filtered branches.
    ///
    /// Branches are grouped by branch set short name in the order the sets are
    /// first seen; weights and values are kept as they are, so each group must
    /// still sum to 1. The new tree has no correlations.
    pub fn from_filtered_branches<I>(branches: I) -> Result<LogicTree>
    where
        I: IntoIterator<Item = FilteredBranch>,
    {
        let mut tree_context: Option<LogicTreeContext> = None;
        let mut groups: Vec<(BranchSetContext, Vec<Branch>)> = Vec::new();

        for filtered in branches {
            if tree_context.is_none() {
                tree_context = Some(filtered.logic_tree.clone());
            }
            match groups
                .iter_mut()
                .find(|(ctx, _)| ctx.short_name == filtered.branch_set.short_name)
            {
                Some((_, group)) => group.push(filtered.branch),
                None => groups.push((filtered.branch_set, vec![filtered.branch])),
            }
        }

        let Some(tree_context) = tree_context else {
            return Err(LogicTreeError::Lookup {
                kind: "filtered branch",
                identifier: "<empty>".to_string(),
            });
        };

        let branch_sets = groups
            .into_iter()
            .map(|(ctx, branches)| BranchSet::new(ctx.short_name, ctx.long_name, branches))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Rebuilding '{}' from {} filtered branch sets",
            tree_context.title,
            branch_sets.len()
        );

        LogicTree::new(
            tree_context.title,
            tree_context.version,
            branch_sets,
            LogicTreeCorrelations::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::branch_set::tests::source_branch;

    fn tree() -> LogicTree {
        LogicTree::new(
            "rebuild",
            "2",
            vec![
                BranchSet::new(
                    "A",
                    "set a",
                    vec![source_branch("a1", 0.5, "SI"), source_branch("a2", 0.5, "SI")],
                )
                .unwrap(),
                BranchSet::new("B", "set b", vec![source_branch("b1", 1.0, "SI")]).unwrap(),
            ],
            LogicTreeCorrelations::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_filtered_branches_carry_context() {
        let tree = tree();
        let filtered: Vec<_> = tree.filtered_branches().collect();
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered[2].branch_set.short_name, "B");
        assert_eq!(filtered[2].logic_tree.title, "rebuild");
        assert_eq!(filtered[0].key(), BranchKey::new("A", "a1"));
    }

    #[test]
    fn test_rebuild_keeps_names_and_weights() {
        let tree = tree();
        let only_a = tree
            .filtered_branches()
            .filter(|f| f.branch_set.short_name == "A");
        let rebuilt = LogicTree::from_filtered_branches(only_a).unwrap();
        assert_eq!(rebuilt.title(), "rebuild");
        assert_eq!(rebuilt.branch_sets().len(), 1);
        assert_eq!(rebuilt.branch_sets()[0], tree.branch_sets()[0]);
    }

    #[test]
    fn test_rebuild_requires_closed_weights() {
        let tree = tree();
        let without_a2 = tree
            .filtered_branches()
            .filter(|f| f.branch.branch_id() != "a2");
        let err = LogicTree::from_filtered_branches(without_a2).unwrap_err();
        assert!(matches!(err, LogicTreeError::WeightSum { .. }));

        assert!(matches!(
            LogicTree::from_filtered_branches(Vec::new()),
            Err(LogicTreeError::Lookup { .. })
        ));
    }
}
