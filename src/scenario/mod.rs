//! Scenario description language and its heads normalization.

pub mod description;
pub(crate) mod expand;

pub use description::{
    Scenario, action, action_then, alt, any_action, any_action_then, any_actions,
    any_actions_default, assert_model, choose, defer, done, empty, fail, for_all, get_size, label,
    monitor, stopping, wait_until, weight, with_state,
};
pub use expand::MAX_EXPANSION_DEPTH;
