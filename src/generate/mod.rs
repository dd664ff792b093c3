//! Scenario generation: weighted search over heads and outcome classification.

pub(crate) mod chooser;
pub mod classifier;
pub mod search;

pub use chooser::ANY_ACTION_ATTEMPTS;
pub use classifier::Evidence;
pub use search::{Generated, generate, looping_bound, target_length};
