//! Sequential request chains with variable extraction.
mod runner;
mod types;


pub use runner::ChainRunner;
pub use types::{ChainResult, ChainStep, Extraction, ExtractionSource, StepResult, StepStatus};
