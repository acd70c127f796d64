pub mod duplicates;

pub use duplicates::{DuplicateResolutionPlan, DuplicateResolver, ResolvedGroup};
