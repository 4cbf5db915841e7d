use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fault-system inversion solution contributing ruptures to a source branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InversionSource {
    pub nrml_id: String,
    pub rupture_set_id: String,
    pub inversion_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inversion_solution_type: Option<String>,
    #[serde(default)]
    pub tectonic_region_types: Vec<String>,
}

/// Gridded or background seismicity source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedSource {
    pub nrml_id: String,
    #[serde(default)]
    pub tectonic_region_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSource {
    Inversion(InversionSource),
    Distributed(DistributedSource),
}

impl BranchSource {
    /// Tag used in the record form.
    pub fn type_tag(&self) -> &'static str {
        match self {
            BranchSource::Inversion(_) => "inversion",
            BranchSource::Distributed(_) => "distributed",
        }
    }

    pub fn nrml_id(&self) -> &str {
        match self {
            BranchSource::Inversion(s) => &s.nrml_id,
            BranchSource::Distributed(s) => &s.nrml_id,
        }
    }

    /// Identifier fed into the branch registry.
    pub fn registry_identity(&self) -> &str {
        match self {
            BranchSource::Inversion(s) => &s.inversion_id,
            BranchSource::Distributed(s) => &s.nrml_id,
        }
    }

    pub fn tectonic_region_types(&self) -> &[String] {
        match self {
            BranchSource::Inversion(s) => &s.tectonic_region_types,
            BranchSource::Distributed(s) => &s.tectonic_region_types,
        }
    }
}

/// Union of the tectonic region types of `sources`.
pub fn tectonic_region_types<'a, I>(sources: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a BranchSource>,
{
    sources
        .into_iter()
        .flat_map(|s| s.tectonic_region_types().iter().cloned())
        .collect()
}
