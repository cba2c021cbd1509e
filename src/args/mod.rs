//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use cli::{BulkArgs, ChainArgs, Cli, Command, CompareArgs, RunArgs};
pub use types::{BodyContentType, HttpMethod, OutputFormat, PositiveU64, PositiveUsize};

pub(crate) use defaults::{DEFAULT_CONFIG_JSON, DEFAULT_CONFIG_TOML, DEFAULT_USER_AGENT};
pub(crate) use parsers::{parse_duration_text, parse_header, parse_key_value};
