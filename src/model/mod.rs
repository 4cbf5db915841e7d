pub mod attribute;
pub mod branch;
pub mod branch_set;
pub mod common;
pub mod composite;
pub mod correlation;
pub mod logic_tree;
pub mod records;
pub mod source;

pub use attribute::*;
pub use branch::*;
pub use branch_set::BranchSet;
pub use common::{is_close, BranchKey, Id, WEIGHT_TOLERANCE};
pub use composite::*;
pub use correlation::*;
pub use logic_tree::*;
pub use records::*;
pub use source::*;
