use itertools::Itertools;
use log::{debug, trace};
use std::collections::HashMap;

use crate::error::{LogicTreeError, Result};
use crate::model::{Branch, BranchKey, BranchSet, CompositeBranch, LogicTreeCorrelations};
use crate::model::common::check_weight_total;

/// Size of the raw cartesian product across `branch_sets`.
pub fn raw_combination_count(branch_sets: &[BranchSet]) -> usize {
    if branch_sets.is_empty() {
        return 0;
    }
    branch_sets.iter().map(|bs| bs.len()).product()
}

/// Lazy enumeration of the correlation-adjusted composite branches.
///
/// Walks the cartesian product of `branch_sets` in branch set order. Each raw
/// combination either passes through with the product of its weights, is
/// discarded because it holds a correlation primary without all of the
/// associated branches, or is accepted with the correlation weight. A
/// combination holding the primaries of several correlations yields
/// [`LogicTreeError::AmbiguousCorrelation`].
pub struct Composer<'a> {
    branch_sets: &'a [BranchSet],
    correlations: &'a LogicTreeCorrelations,
    primaries: HashMap<(&'a str, &'a str), usize>,
    product: Box<dyn Iterator<Item = Vec<&'a Branch>> + 'a>,
    discarded: usize,
}

/// Start a fresh enumeration. Each call is independent of any other.
pub fn compose<'a>(
    branch_sets: &'a [BranchSet],
    correlations: &'a LogicTreeCorrelations,
) -> Composer<'a> {
    let primaries = correlations
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let key = &c.primary().key;
            ((key.branch_set.as_str(), key.branch_id.as_str()), idx)
        })
        .collect();

    let product: Box<dyn Iterator<Item = Vec<&'a Branch>> + 'a> =
        if raw_combination_count(branch_sets) == 0 {
            Box::new(std::iter::empty())
        } else {
            Box::new(
                branch_sets
                    .iter()
                    .map(|bs| bs.branches().iter())
                    .multi_cartesian_product(),
            )
        };

    Composer {
        branch_sets,
        correlations,
        primaries,
        product,
        discarded: 0,
    }
}

impl<'a> Composer<'a> {
    /// Number of raw combinations dropped so far by correlation filtering.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    fn resolve(&self, combination: Vec<&'a Branch>) -> Result<Option<CompositeBranch>> {
        let branch_sets: &'a [BranchSet] = self.branch_sets;

        let matched: Vec<usize> = branch_sets
            .iter()
            .zip(&combination)
            .filter_map(|(bs, b)| self.primaries.get(&(bs.short_name(), b.branch_id())).copied())
            .collect();

        let keys: Vec<BranchKey> = branch_sets
            .iter()
            .zip(&combination)
            .map(|(bs, b)| BranchKey::new(bs.short_name(), b.branch_id()))
            .collect();

        let weight = match matched.as_slice() {
            [] => combination.iter().map(|b| b.weight()).product(),
            [idx] => {
                let Some(correlation) = self.correlations.get(*idx) else {
                    return Err(LogicTreeError::Lookup {
                        kind: "correlation",
                        identifier: idx.to_string(),
                    });
                };
                if !correlation.associated().iter().all(|a| keys.contains(&a.key)) {
                    return Ok(None);
                }
                let uncovered: f64 = keys
                    .iter()
                    .zip(&combination)
                    .filter(|(key, _)| !correlation.covers(key))
                    .map(|(_, b)| b.weight())
                    .product();
                correlation.weight() * uncovered
            }
            several => {
                let primaries = several
                    .iter()
                    .filter_map(|idx| self.correlations.get(*idx))
                    .map(|c| c.primary().key.to_string())
                    .collect();
                return Err(LogicTreeError::AmbiguousCorrelation {
                    composite: keys.iter().map(|k| k.to_string()).join(", "),
                    primaries,
                });
            }
        };

        Ok(Some(CompositeBranch {
            branches: combination.into_iter().cloned().collect(),
            keys,
            weight,
        }))
    }
}

impl<'a> Iterator for Composer<'a> {
    type Item = Result<CompositeBranch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let combination = self.product.next()?;
            match self.resolve(combination) {
                Ok(Some(composite)) => return Some(Ok(composite)),
                Ok(None) => {
                    self.discarded += 1;
                    trace!("Discarded combination violating a correlation");
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Outcome of a full enumeration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionSummary {
    pub raw_combinations: usize,
    pub composite_branches: usize,
    pub discarded: usize,
    pub total_weight: f64,
}

/// Enumerate every composite branch and check that their weights sum to 1.
///
/// The check is skipped when the raw combination space is empty.
pub fn validate_composition(
    title: &str,
    branch_sets: &[BranchSet],
    correlations: &LogicTreeCorrelations,
) -> Result<CompositionSummary> {
    let mut composer = compose(branch_sets, correlations);
    let mut composite_branches = 0;
    let mut total_weight = 0.0;
    for composite in composer.by_ref() {
        let composite = composite?;
        composite_branches += 1;
        total_weight += composite.weight();
    }

    let summary = CompositionSummary {
        raw_combinations: raw_combination_count(branch_sets),
        composite_branches,
        discarded: composer.discarded(),
        total_weight,
    };
    debug!(
        "Composed '{}': {} raw combinations, {} composite branches, {} discarded",
        title, summary.raw_combinations, summary.composite_branches, summary.discarded
    );

    if summary.raw_combinations > 0 {
        check_weight_total(
            || format!("composite branches of logic tree '{}'", title),
            total_weight,
        )?;
    }
    Ok(summary)
}
