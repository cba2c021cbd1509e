//! Configuration loading and application.
mod apply;
mod loader;
mod parse;
pub mod types;

#[cfg(test)]
mod tests;

pub use apply::{
    ChainPlan, OutputSettings, build_bulk_entries, build_chain_plan, build_run_request,
    output_settings,
};
pub use loader::{load_config, load_config_file};

pub(crate) use parse::parse_duration_value;
