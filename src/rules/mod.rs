//! Conditional-logic evaluation over form data.

pub mod condition;
pub mod engine;
pub mod path;

pub use condition::evaluate_condition;
pub use engine::{EvaluatedFieldState, EvaluatedState, ForcedValue, RuleEngine};
pub use path::resolve_path;
