use log::debug;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{LogicTreeError, Result};
use crate::model::branch::Branch;
use crate::model::branch_set::BranchSet;
use crate::model::common::BranchKey;

/// A branch referenced by a correlation, together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedBranch {
    pub key: BranchKey,
    pub branch: Branch,
}

impl CorrelatedBranch {
    /// Resolve `key` against `branch_sets`.
    pub fn resolve(key: BranchKey, branch_sets: &[BranchSet]) -> Result<Self> {
        let branch_set = branch_sets
            .iter()
            .find(|bs| bs.short_name() == key.branch_set)
            .ok_or_else(|| LogicTreeError::Lookup {
                kind: "branch set",
                identifier: key.branch_set.clone(),
            })?;
        let branch = branch_set
            .get_branch(&key.branch_id)
            .ok_or_else(|| LogicTreeError::Lookup {
                kind: "branch",
                identifier: key.to_string(),
            })?;
        Ok(Self {
            branch: branch.clone(),
            key,
        })
    }
}

/// Binds a primary branch to the branches it must co-occur with.
///
/// A composite branch holding the primary is valid only if it holds every
/// associated branch; its weight then becomes `weight` times the weights of
/// the branches the correlation does not cover.
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    primary: CorrelatedBranch,
    associated: Vec<CorrelatedBranch>,
    weight: f64,
}

impl Correlation {
    /// `weight` defaults to the weight of the primary branch.
    pub fn new(
        primary: CorrelatedBranch,
        associated: Vec<CorrelatedBranch>,
        weight: Option<f64>,
    ) -> Self {
        let weight = weight.unwrap_or_else(|| primary.branch.weight());
        Self {
            primary,
            associated,
            weight,
        }
    }

    pub fn primary(&self) -> &CorrelatedBranch {
        &self.primary
    }

    pub fn primary_branch(&self) -> &Branch {
        &self.primary.branch
    }

    pub fn associated(&self) -> &[CorrelatedBranch] {
        &self.associated
    }

    pub fn associated_branches(&self) -> impl Iterator<Item = &Branch> + '_ {
        self.associated.iter().map(|c| &c.branch)
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Primary key first, then the associated keys in order.
    pub fn all_keys(&self) -> impl Iterator<Item = &BranchKey> + '_ {
        std::iter::once(&self.primary.key).chain(self.associated.iter().map(|c| &c.key))
    }

    pub fn all_branches(&self) -> impl Iterator<Item = &Branch> + '_ {
        std::iter::once(&self.primary.branch).chain(self.associated_branches())
    }

    pub fn covers(&self, key: &BranchKey) -> bool {
        self.all_keys().any(|k| k == key)
    }

    /// The weight when it differs from the primary branch weight.
    pub fn explicit_weight(&self) -> Option<f64> {
        (self.weight.to_bits() != self.primary.branch.weight().to_bits()).then_some(self.weight)
    }

    /// The canonical encoded form: primary first.
    pub fn encode(&self) -> Vec<String> {
        self.all_keys().map(|k| k.to_string()).collect()
    }
}

/// Ordered correlations of one logic tree. No branch is primary twice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogicTreeCorrelations {
    correlations: Vec<Correlation>,
}

impl LogicTreeCorrelations {
    pub fn new(correlations: Vec<Correlation>) -> Result<Self> {
        let mut counts: HashMap<&BranchKey, usize> = HashMap::new();
        for correlation in &correlations {
            *counts.entry(&correlation.primary.key).or_insert(0) += 1;
        }

        // Report every repeated primary at once, in correlation order.
        let mut duplicated: Vec<String> = Vec::new();
        for correlation in &correlations {
            let key = &correlation.primary.key;
            if counts[key] > 1 && !duplicated.contains(&key.to_string()) {
                duplicated.push(key.to_string());
            }
        }
        if !duplicated.is_empty() {
            return Err(LogicTreeError::DuplicatePrimary {
                primaries: duplicated,
            });
        }

        Ok(Self { correlations })
    }

    /// Resolve the encoded form, a list of groups of `"<set>:<id>"` strings with
    /// the primary first, against `branch_sets`.
    pub fn from_encoded(groups: &[Vec<Value>], branch_sets: &[BranchSet]) -> Result<Self> {
        Self::from_encoded_weighted(groups, &[], branch_sets)
    }

    /// Like [`LogicTreeCorrelations::from_encoded`], with an optional weight per
    /// group. `weights` is either empty or as long as `groups`.
    pub fn from_encoded_weighted(
        groups: &[Vec<Value>],
        weights: &[Option<f64>],
        branch_sets: &[BranchSet],
    ) -> Result<Self> {
        if !weights.is_empty() && weights.len() != groups.len() {
            return Err(LogicTreeError::format(
                "correlation_weights",
                format!("{} weights for {} correlation groups", weights.len(), groups.len()),
            ));
        }
        let mut correlations = Vec::with_capacity(groups.len());

        for (idx, group) in groups.iter().enumerate() {
            if group.is_empty() {
                return Err(LogicTreeError::format(
                    format!("group {}", idx),
                    "correlation group is empty",
                ));
            }

            let keys = group
                .iter()
                .map(|entry| match entry {
                    Value::String(s) => BranchKey::parse(s),
                    other => Err(LogicTreeError::format(
                        other,
                        "branch references must be strings",
                    )),
                })
                .collect::<Result<Vec<_>>>()?;

            let mut resolved = keys
                .into_iter()
                .map(|key| CorrelatedBranch::resolve(key, branch_sets))
                .collect::<Result<Vec<_>>>()?;
            let primary = resolved.remove(0);
            let weight = weights.get(idx).copied().flatten();
            correlations.push(Correlation::new(primary, resolved, weight));
        }

        debug!("Resolved {} correlation groups", correlations.len());
        Self::new(correlations)
    }

    /// Weights to store next to [`LogicTreeCorrelations::encode`]. Empty when
    /// every correlation uses its primary branch weight.
    pub fn encode_weights(&self) -> Vec<Option<f64>> {
        if self.correlations.iter().all(|c| c.explicit_weight().is_none()) {
            return Vec::new();
        }
        self.correlations.iter().map(Correlation::explicit_weight).collect()
    }

    pub fn encode(&self) -> Vec<Vec<Value>> {
        self.correlations
            .iter()
            .map(|c| c.encode().into_iter().map(Value::String).collect())
            .collect()
    }

    pub fn primary_branches(&self) -> impl Iterator<Item = &CorrelatedBranch> + '_ {
        self.correlations.iter().map(|c| &c.primary)
    }

    pub fn position_of_primary(&self, key: &BranchKey) -> Option<usize> {
        self.correlations.iter().position(|c| &c.primary.key == key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Correlation> {
        self.correlations.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&Correlation> {
        self.correlations.get(idx)
    }

    pub fn len(&self) -> usize {
        self.correlations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.correlations.is_empty()
    }
}

impl<'a> IntoIterator for &'a LogicTreeCorrelations {
    type Item = &'a Correlation;
    type IntoIter = std::slice::Iter<'a, Correlation>;

    fn into_iter(self) -> Self::IntoIter {
        self.correlations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::branch_set::tests::source_branch;
    use serde_json::json;

    fn branch_sets() -> Vec<BranchSet> {
        vec![
            BranchSet::new(
                "A",
                "set a",
                vec![source_branch("a1", 0.5, "SI"), source_branch("a2", 0.5, "SI")],
            )
            .unwrap(),
            BranchSet::new(
                "B",
                "set b",
                vec![source_branch("b1", 0.25, "SI"), source_branch("b2", 0.75, "SI")],
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_from_encoded() {
        let groups = vec![vec![json!("A:a1"), json!("B:b1")], vec![json!("A:a2"), json!("B:b2")]];
        let correlations = LogicTreeCorrelations::from_encoded(&groups, &branch_sets()).unwrap();
        assert_eq!(correlations.len(), 2);

        let first = correlations.get(0).unwrap();
        assert_eq!(first.primary().key, BranchKey::new("A", "a1"));
        assert_eq!(first.weight(), 0.5);
        assert!(first.covers(&BranchKey::new("B", "b1")));
        assert!(!first.covers(&BranchKey::new("B", "b2")));
        assert_eq!(first.all_branches().count(), 2);

        let primaries: Vec<_> = correlations
            .primary_branches()
            .map(|p| p.key.to_string())
            .collect();
        assert_eq!(primaries, vec!["A:a1", "A:a2"]);
        assert_eq!(correlations.encode(), groups);
    }

    #[test]
    fn test_explicit_weight() {
        let sets = branch_sets();
        let primary = CorrelatedBranch::resolve(BranchKey::new("A", "a1"), &sets).unwrap();
        let associated = CorrelatedBranch::resolve(BranchKey::new("B", "b1"), &sets).unwrap();
        let correlation = Correlation::new(primary.clone(), vec![associated.clone()], Some(0.3));
        assert_eq!(correlation.weight(), 0.3);
        assert_eq!(correlation.explicit_weight(), Some(0.3));

        let default = Correlation::new(primary, vec![associated], None);
        assert_eq!(default.explicit_weight(), None);
    }

    #[test]
    fn test_encoded_weights() {
        let sets = branch_sets();
        let groups = vec![vec![json!("A:a1"), json!("B:b1")], vec![json!("A:a2"), json!("B:b2")]];

        let plain = LogicTreeCorrelations::from_encoded(&groups, &sets).unwrap();
        assert!(plain.encode_weights().is_empty());

        let weighted =
            LogicTreeCorrelations::from_encoded_weighted(&groups, &[Some(0.7), None], &sets)
                .unwrap();
        assert_eq!(weighted.get(0).unwrap().weight(), 0.7);
        assert_eq!(weighted.get(1).unwrap().weight(), 0.5);
        assert_eq!(weighted.encode_weights(), vec![Some(0.7), None]);

        assert!(matches!(
            LogicTreeCorrelations::from_encoded_weighted(&groups, &[Some(0.7)], &sets),
            Err(LogicTreeError::Format { .. })
        ));
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        let sets = branch_sets();

        let malformed = vec![vec![json!("A-a1"), json!("B:b1")]];
        assert!(matches!(
            LogicTreeCorrelations::from_encoded(&malformed, &sets),
            Err(LogicTreeError::Format { .. })
        ));

        let not_a_string = vec![vec![json!("A:a1"), json!(42)]];
        assert!(matches!(
            LogicTreeCorrelations::from_encoded(&not_a_string, &sets),
            Err(LogicTreeError::Format { .. })
        ));

        let empty_group: Vec<Vec<Value>> = vec![vec![]];
        assert!(matches!(
            LogicTreeCorrelations::from_encoded(&empty_group, &sets),
            Err(LogicTreeError::Format { .. })
        ));

        let unknown_set = vec![vec![json!("Z:a1"), json!("B:b1")]];
        assert_eq!(
            LogicTreeCorrelations::from_encoded(&unknown_set, &sets).unwrap_err(),
            LogicTreeError::Lookup {
                kind: "branch set",
                identifier: "Z".to_string()
            }
        );

        let unknown_branch = vec![vec![json!("A:a9"), json!("B:b1")]];
        assert_eq!(
            LogicTreeCorrelations::from_encoded(&unknown_branch, &sets).unwrap_err(),
            LogicTreeError::Lookup {
                kind: "branch",
                identifier: "A:a9".to_string()
            }
        );

        let duplicate = vec![
            vec![json!("A:a1"), json!("B:b1")],
            vec![json!("A:a1"), json!("B:b2")],
            vec![json!("A:a2"), json!("B:b2")],
        ];
        assert_eq!(
            LogicTreeCorrelations::from_encoded(&duplicate, &sets).unwrap_err(),
            LogicTreeError::DuplicatePrimary {
                primaries: vec!["A:a1".to_string()]
            }
        );
    }
}
