//! Pass/fail rules checked against a finished run.
mod evaluate;
mod json_path;
mod types;


pub use evaluate::{AssertionContext, UNDEFINED, evaluate};
pub use json_path::{lookup as lookup_json_path, value_to_text};
pub use types::{AssertionKind, AssertionOperator, AssertionResult, AssertionRule};
