pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use error::{DuplicateKind, LogicTreeError, Result};

// Export logic types
pub use logic::{
    compose, filter_branches, parse_filter_expr, validate_composition, BranchFilterEvaluator,
    BranchPath, BranchSetContext, CompositionSummary, FilterExpr, FilteredBranch, LogicTreeContext,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{BranchRegistry, RegistryEntry};
