pub mod branch_filter;
pub mod combine;
pub mod rebuild;

pub use branch_filter::*;
pub use combine::{
    compose, raw_combination_count, validate_composition, Composer, CompositionSummary,
};
pub use rebuild::*;
