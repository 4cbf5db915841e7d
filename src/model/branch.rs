use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{LogicTreeError, Result};
use crate::model::attribute::{AttributeValue, BranchAttributeValue};
use crate::model::common::{check_key_part, Id};
use crate::model::source::{tectonic_region_types, BranchSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    Source,
    Gmcm,
}

impl std::fmt::Display for BranchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BranchKind::Source => write!(f, "source"),
            BranchKind::Gmcm => write!(f, "gmcm"),
        }
    }
}

/// Fields that may be replaced when rebuilding a branch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchOverrides {
    pub branch_id: Option<Id>,
    pub weight: Option<f64>,
}

impl BranchOverrides {
    pub fn weight(weight: f64) -> Self {
        Self {
            branch_id: None,
            weight: Some(weight),
        }
    }
}

fn check_id_and_weight(branch_id: &str, weight: f64) -> Result<()> {
    check_key_part("branch id", branch_id)?;
    if weight > 0.0 && weight <= 1.0 {
        Ok(())
    } else {
        Err(LogicTreeError::InvalidWeight {
            branch: branch_id.to_string(),
            weight,
        })
    }
}

/// A source model alternative: attribute values plus the sources realising them.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBranch {
    branch_id: Id,
    weight: f64,
    values: Vec<BranchAttributeValue>,
    sources: Vec<BranchSource>,
    rupture_rate_scaling: Option<f64>,
}

impl SourceBranch {
    pub fn new(
        branch_id: impl Into<Id>,
        weight: f64,
        values: Vec<BranchAttributeValue>,
        sources: Vec<BranchSource>,
    ) -> Result<Self> {
        let branch_id = branch_id.into();
        check_id_and_weight(&branch_id, weight)?;
        if sources.is_empty() {
            return Err(LogicTreeError::integrity(
                branch_id,
                "source branch has no inversion or distributed sources",
            ));
        }
        Ok(Self {
            branch_id,
            weight,
            values,
            sources,
            rupture_rate_scaling: None,
        })
    }

    /// Branch id built from the attribute values, e.g. `dmgeodetic, b0.95`.
    pub fn derived_id(values: &[BranchAttributeValue]) -> Id {
        values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn with_rupture_rate_scaling(mut self, scaling: f64) -> Self {
        self.rupture_rate_scaling = Some(scaling);
        self
    }

    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn values(&self) -> &[BranchAttributeValue] {
        &self.values
    }

    pub fn sources(&self) -> &[BranchSource] {
        &self.sources
    }

    pub fn rupture_rate_scaling(&self) -> Option<f64> {
        self.rupture_rate_scaling
    }

    fn rebuild(&self, overrides: BranchOverrides) -> Result<Self> {
        let mut rebuilt = Self::new(
            overrides.branch_id.unwrap_or_else(|| self.branch_id.clone()),
            overrides.weight.unwrap_or(self.weight),
            self.values.clone(),
            self.sources.clone(),
        )?;
        rebuilt.rupture_rate_scaling = self.rupture_rate_scaling;
        Ok(rebuilt)
    }
}

/// A ground motion model alternative for one tectonic region type.
#[derive(Debug, Clone, PartialEq)]
pub struct GmcmBranch {
    branch_id: Id,
    weight: f64,
    gsim_name: String,
    gsim_args: BTreeMap<String, AttributeValue>,
    tectonic_region_type: String,
}

impl GmcmBranch {
    pub fn new(
        branch_id: impl Into<Id>,
        weight: f64,
        gsim_name: impl Into<String>,
        gsim_args: BTreeMap<String, AttributeValue>,
        tectonic_region_type: impl Into<String>,
    ) -> Result<Self> {
        let branch_id = branch_id.into();
        check_id_and_weight(&branch_id, weight)?;
        let gsim_name = gsim_name.into();
        if gsim_name.is_empty() {
            return Err(LogicTreeError::integrity(branch_id, "gsim_name is empty"));
        }
        Ok(Self {
            branch_id,
            weight,
            gsim_name,
            gsim_args,
            tectonic_region_type: tectonic_region_type.into(),
        })
    }

    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn gsim_name(&self) -> &str {
        &self.gsim_name
    }

    pub fn gsim_args(&self) -> &BTreeMap<String, AttributeValue> {
        &self.gsim_args
    }

    pub fn tectonic_region_type(&self) -> &str {
        &self.tectonic_region_type
    }

    fn rebuild(&self, overrides: BranchOverrides) -> Result<Self> {
        Self::new(
            overrides.branch_id.unwrap_or_else(|| self.branch_id.clone()),
            overrides.weight.unwrap_or(self.weight),
            self.gsim_name.clone(),
            self.gsim_args.clone(),
            self.tectonic_region_type.clone(),
        )
    }
}

/// A weighted leaf of a branch set.
#[derive(Debug, Clone, PartialEq)]
pub enum Branch {
    Source(SourceBranch),
    Gmcm(GmcmBranch),
}

impl Branch {
    pub fn kind(&self) -> BranchKind {
        match self {
            Branch::Source(_) => BranchKind::Source,
            Branch::Gmcm(_) => BranchKind::Gmcm,
        }
    }

    pub fn branch_id(&self) -> &str {
        match self {
            Branch::Source(b) => b.branch_id(),
            Branch::Gmcm(b) => b.branch_id(),
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Branch::Source(b) => b.weight(),
            Branch::Gmcm(b) => b.weight(),
        }
    }

    pub fn as_source(&self) -> Option<&SourceBranch> {
        match self {
            Branch::Source(b) => Some(b),
            Branch::Gmcm(_) => None,
        }
    }

    pub fn as_gmcm(&self) -> Option<&GmcmBranch> {
        match self {
            Branch::Gmcm(b) => Some(b),
            Branch::Source(_) => None,
        }
    }

    /// Attribute values of a source branch; empty for ground motion branches.
    pub fn values(&self) -> &[BranchAttributeValue] {
        match self {
            Branch::Source(b) => b.values(),
            Branch::Gmcm(_) => &[],
        }
    }

    /// Look up a named attribute value or gsim argument.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        match self {
            Branch::Source(b) => b.values().iter().find(|v| v.name == name).map(|v| &v.value),
            Branch::Gmcm(b) => b.gsim_args().get(name),
        }
    }

    pub fn tectonic_region_types(&self) -> BTreeSet<String> {
        match self {
            Branch::Source(b) => tectonic_region_types(b.sources()),
            Branch::Gmcm(b) => BTreeSet::from([b.tectonic_region_type().to_string()]),
        }
    }

    /// Order independent identity used by the branch registry.
    pub fn registry_identity(&self) -> String {
        match self {
            Branch::Source(b) => {
                let ids: BTreeSet<&str> =
                    b.sources().iter().map(|s| s.registry_identity()).collect();
                ids.into_iter().collect::<Vec<_>>().join("|")
            }
            Branch::Gmcm(b) => {
                let args: Vec<String> = b
                    .gsim_args()
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                format!("{}({})", b.gsim_name(), args.join(","))
            }
        }
    }

    /// New branch with `overrides` applied, validated again.
    pub fn rebuild(&self, overrides: BranchOverrides) -> Result<Branch> {
        match self {
            Branch::Source(b) => b.rebuild(overrides).map(Branch::Source),
            Branch::Gmcm(b) => b.rebuild(overrides).map(Branch::Gmcm),
        }
    }
}

impl From<SourceBranch> for Branch {
    fn from(b: SourceBranch) -> Self {
        Branch::Source(b)
    }
}

impl From<GmcmBranch> for Branch {
    fn from(b: GmcmBranch) -> Self {
        Branch::Gmcm(b)
    }
}
