use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{LogicTreeError, Result};
use crate::model::attribute::{AttributeValue, BranchAttributeValue};
use crate::model::branch::{Branch, GmcmBranch, SourceBranch};
use crate::model::branch_set::BranchSet;
use crate::model::correlation::LogicTreeCorrelations;
use crate::model::logic_tree::LogicTree;
use crate::model::source::{BranchSource, DistributedSource, InversionSource};

/// Serialized form of a logic tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicTreeRecord {
    pub title: String,
    #[serde(default)]
    pub version: String,
    pub branch_sets: Vec<BranchSetRecord>,
    /// Groups of `"<branch_set>:<branch_id>"` references, primary first.
    #[serde(default)]
    pub correlations: Vec<Vec<Value>>,
    /// Per group weight overriding the primary branch weight. Omitted when no
    /// group overrides it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlation_weights: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSetRecord {
    pub short_name: String,
    #[serde(default)]
    pub long_name: String,
    pub branches: Vec<BranchRecord>,
}

// Gmcm must come first: a source record never carries gsim_name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BranchRecord {
    Gmcm(GmcmBranchRecord),
    Source(SourceBranchRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBranchRecord {
    /// Derived from `values` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    pub weight: f64,
    #[serde(default)]
    pub values: Vec<BranchAttributeValue>,
    pub sources: Vec<SourceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rupture_rate_scaling: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmcmBranchRecord {
    pub branch_id: String,
    pub weight: f64,
    pub gsim_name: String,
    #[serde(default)]
    pub gsim_args: BTreeMap<String, AttributeValue>,
    pub tectonic_region_type: String,
}

/// Flat source description tagged with its `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(rename = "type")]
    pub source_type: String,
    pub nrml_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rupture_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inversion_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inversion_solution_type: Option<String>,
    #[serde(default)]
    pub tectonic_region_types: Vec<String>,
}

impl SourceRecord {
    /// Convert to a typed source, checking the `type` tag against the fields present.
    pub fn into_source(self, branch: &str) -> Result<BranchSource> {
        match self.source_type.as_str() {
            "inversion" => {
                let (Some(rupture_set_id), Some(inversion_id)) =
                    (self.rupture_set_id, self.inversion_id)
                else {
                    return Err(LogicTreeError::integrity(
                        branch,
                        format!(
                            "inversion source '{}' needs rupture_set_id and inversion_id",
                            self.nrml_id
                        ),
                    ));
                };
                Ok(BranchSource::Inversion(InversionSource {
                    nrml_id: self.nrml_id,
                    rupture_set_id,
                    inversion_id,
                    inversion_solution_type: self.inversion_solution_type,
                    tectonic_region_types: self.tectonic_region_types,
                }))
            }
            "distributed" => {
                if self.inversion_id.is_some() || self.rupture_set_id.is_some() {
                    return Err(LogicTreeError::integrity(
                        branch,
                        format!(
                            "distributed source '{}' carries inversion fields",
                            self.nrml_id
                        ),
                    ));
                }
                Ok(BranchSource::Distributed(DistributedSource {
                    nrml_id: self.nrml_id,
                    tectonic_region_types: self.tectonic_region_types,
                }))
            }
            other => Err(LogicTreeError::integrity(
                branch,
                format!("unknown source type '{}'", other),
            )),
        }
    }

    pub fn from_source(source: &BranchSource) -> Self {
        match source {
            BranchSource::Inversion(s) => Self {
                source_type: source.type_tag().to_string(),
                nrml_id: s.nrml_id.clone(),
                rupture_set_id: Some(s.rupture_set_id.clone()),
                inversion_id: Some(s.inversion_id.clone()),
                inversion_solution_type: s.inversion_solution_type.clone(),
                tectonic_region_types: s.tectonic_region_types.clone(),
            },
            BranchSource::Distributed(s) => Self {
                source_type: source.type_tag().to_string(),
                nrml_id: s.nrml_id.clone(),
                rupture_set_id: None,
                inversion_id: None,
                inversion_solution_type: None,
                tectonic_region_types: s.tectonic_region_types.clone(),
            },
        }
    }
}

impl BranchRecord {
    pub fn into_branch(self) -> Result<Branch> {
        match self {
            BranchRecord::Gmcm(r) => GmcmBranch::new(
                r.branch_id,
                r.weight,
                r.gsim_name,
                r.gsim_args,
                r.tectonic_region_type,
            )
            .map(Branch::Gmcm),
            BranchRecord::Source(r) => {
                let branch_id = r
                    .branch_id
                    .unwrap_or_else(|| SourceBranch::derived_id(&r.values));
                let sources = r
                    .sources
                    .into_iter()
                    .map(|s| s.into_source(&branch_id))
                    .collect::<Result<Vec<_>>>()?;
                let branch = SourceBranch::new(branch_id, r.weight, r.values, sources)?;
                Ok(Branch::Source(match r.rupture_rate_scaling {
                    Some(scaling) => branch.with_rupture_rate_scaling(scaling),
                    None => branch,
                }))
            }
        }
    }

    pub fn from_branch(branch: &Branch) -> Self {
        match branch {
            Branch::Source(b) => BranchRecord::Source(SourceBranchRecord {
                branch_id: Some(b.branch_id().to_string()),
                weight: b.weight(),
                values: b.values().to_vec(),
                sources: b.sources().iter().map(SourceRecord::from_source).collect(),
                rupture_rate_scaling: b.rupture_rate_scaling(),
            }),
            Branch::Gmcm(b) => BranchRecord::Gmcm(GmcmBranchRecord {
                branch_id: b.branch_id().to_string(),
                weight: b.weight(),
                gsim_name: b.gsim_name().to_string(),
                gsim_args: b.gsim_args().clone(),
                tectonic_region_type: b.tectonic_region_type().to_string(),
            }),
        }
    }
}

impl BranchSetRecord {
    pub fn into_branch_set(self) -> Result<BranchSet> {
        let branches = self
            .branches
            .into_iter()
            .map(BranchRecord::into_branch)
            .collect::<Result<Vec<_>>>()?;
        BranchSet::new(self.short_name, self.long_name, branches)
    }

    pub fn from_branch_set(branch_set: &BranchSet) -> Self {
        Self {
            short_name: branch_set.short_name().to_string(),
            long_name: branch_set.long_name().to_string(),
            branches: branch_set.branches().iter().map(BranchRecord::from_branch).collect(),
        }
    }
}

impl LogicTree {
    pub fn from_record(record: LogicTreeRecord) -> Result<Self> {
        let branch_sets = record
            .branch_sets
            .into_iter()
            .map(BranchSetRecord::into_branch_set)
            .collect::<Result<Vec<_>>>()?;
        let correlations = LogicTreeCorrelations::from_encoded_weighted(
            &record.correlations,
            &record.correlation_weights,
            &branch_sets,
        )?;
        LogicTree::new(record.title, record.version, branch_sets, correlations)
    }

    pub fn to_record(&self) -> LogicTreeRecord {
        LogicTreeRecord {
            title: self.title().to_string(),
            version: self.version().to_string(),
            branch_sets: self
                .branch_sets()
                .iter()
                .map(BranchSetRecord::from_branch_set)
                .collect(),
            correlations: self.correlations().encode(),
            correlation_weights: self.correlations().encode_weights(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let record: LogicTreeRecord = serde_json::from_str(json)?;
        Self::from_record(record)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::branch_set::tests::source_branch;
    use crate::model::common::BranchKey;
    use crate::model::correlation::{CorrelatedBranch, Correlation};
    use serde_json::json;

    fn inversion_record() -> SourceRecord {
        SourceRecord {
            source_type: "inversion".to_string(),
            nrml_id: "nrml-1".to_string(),
            rupture_set_id: Some("rs-1".to_string()),
            inversion_id: Some("inv-1".to_string()),
            inversion_solution_type: None,
            tectonic_region_types: vec!["Active Shallow Crust".to_string()],
        }
    }

    #[test]
    fn test_source_type_tag_checks() {
        assert!(inversion_record().into_source("b").is_ok());

        let mut missing = inversion_record();
        missing.inversion_id = None;
        assert!(matches!(missing.into_source("b"), Err(LogicTreeError::Integrity { .. })));

        let mut mismatched = inversion_record();
        mismatched.source_type = "distributed".to_string();
        assert!(matches!(mismatched.into_source("b"), Err(LogicTreeError::Integrity { .. })));

        let mut unknown = inversion_record();
        unknown.source_type = "grid".to_string();
        let err = unknown.into_source("b").unwrap_err();
        assert!(err.to_string().contains("unknown source type 'grid'"));
    }

    #[test]
    fn test_branch_record_variants() {
        let gmcm: BranchRecord = serde_json::from_value(json!({
            "branch_id": "Bradley2013",
            "weight": 1.0,
            "gsim_name": "Bradley2013",
            "gsim_args": {"sigma_mu_epsilon": 0.0},
            "tectonic_region_type": "Active Shallow Crust"
        }))
        .unwrap();
        assert!(matches!(gmcm, BranchRecord::Gmcm(_)));

        let source: BranchRecord = serde_json::from_value(json!({
            "weight": 1.0,
            "values": [{"name": "dm", "long_name": "deformation model", "value": "geodetic"},
                       {"name": "bN", "long_name": "bN pair", "value": [0.95, 16.5]}],
            "sources": [{"type": "distributed", "nrml_id": "bg-1"}]
        }))
        .unwrap();
        let branch = source.into_branch().unwrap();
        assert_eq!(branch.branch_id(), "dmgeodetic, bN(0.95, 16.5)");
    }

    #[test]
    fn test_gmcm_tree_round_trip() {
        let record: LogicTreeRecord = serde_json::from_value(json!({
            "title": "GMCM",
            "version": "2",
            "branch_sets": [{
                "short_name": "ASC",
                "long_name": "Active Shallow Crust",
                "branches": [
                    {"branch_id": "Stafford2022_central", "weight": 0.6,
                     "gsim_name": "Stafford2022", "gsim_args": {"mu_branch": "Central"},
                     "tectonic_region_type": "Active Shallow Crust"},
                    {"branch_id": "Stafford2022_upper", "weight": 0.4, "gsim_name": "Stafford2022",
                     "gsim_args": {"mu_branch": "Upper"},
                     "tectonic_region_type": "Active Shallow Crust"}
                ]
            }]
        }))
        .unwrap();
        let tree = LogicTree::from_record(record.clone()).unwrap();
        assert_eq!(tree.combined_branches().count(), 2);
        assert_eq!(tree.to_record(), record);
    }

    #[test]
    fn test_explicit_correlation_weights_round_trip() {
        let sets = vec![
            BranchSet::new(
                "A",
                "set a",
                vec![source_branch("a1", 0.5, "SI"), source_branch("a2", 0.5, "SI")],
            )
            .unwrap(),
            BranchSet::new(
                "B",
                "set b",
                vec![source_branch("b1", 0.5, "SI"), source_branch("b2", 0.5, "SI")],
            )
            .unwrap(),
        ];
        let resolve =
            |key: &str| CorrelatedBranch::resolve(BranchKey::parse(key).unwrap(), &sets).unwrap();
        let correlate = |primary: &str, associated: &str, weight: f64| {
            Correlation::new(resolve(primary), vec![resolve(associated)], Some(weight))
        };
        let correlations = LogicTreeCorrelations::new(vec![
            correlate("A:a1", "B:b1", 0.7),
            correlate("A:a2", "B:b2", 0.3),
        ])
        .unwrap();
        let tree = LogicTree::new("weighted", "1", sets.clone(), correlations).unwrap();

        let record = tree.to_record();
        assert_eq!(record.correlation_weights, vec![Some(0.7), Some(0.3)]);

        let reloaded = LogicTree::from_json(&tree.to_json_pretty().unwrap()).unwrap();
        assert_eq!(reloaded, tree);
        let weights: Vec<f64> = reloaded.combined_branches().map(|c| c.weight()).collect();
        assert_eq!(weights, vec![0.7, 0.3]);
    }

    #[test]
    fn test_default_correlation_weights_are_omitted() {
        let json = json!({
            "title": "plain",
            "branch_sets": [
                {"short_name": "A", "branches": [
                    {"branch_id": "a1", "weight": 1.0,
                     "sources": [{"type": "distributed", "nrml_id": "n-a1"}]}
                ]},
                {"short_name": "B", "branches": [
                    {"branch_id": "b1", "weight": 1.0,
                     "sources": [{"type": "distributed", "nrml_id": "n-b1"}]}
                ]}
            ],
            "correlations": [["A:a1", "B:b1"]]
        });
        let tree = LogicTree::from_json(&json.to_string()).unwrap();
        let written: Value = serde_json::from_str(&tree.to_json_pretty().unwrap()).unwrap();
        assert!(written.get("correlation_weights").is_none());
        assert_eq!(written["correlations"], json!([["A:a1", "B:b1"]]));
    }
}
