//! Step/outcome model: trace vocabulary, witnesses, outcomes, rendering, and
//! the domain model contract.

pub mod outcome;
pub mod render;
pub mod state;
pub mod step;
pub mod witness;
