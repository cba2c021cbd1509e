use super::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported config extension '{ext}'. Use .toml or .json.")]
    UnsupportedExtension { ext: String },
    #[error("Config file must have .toml or .json extension.")]
    MissingExtension,
    #[error("Config cannot set both '{left}' and '{right}'.")]
    Conflict {
        left: &'static str,
        right: &'static str,
    },
    #[error("Missing URL (set --url or provide [request].url in config).")]
    MissingUrl,
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme '{scheme}'. Use http or https.")]
    UnsupportedScheme { scheme: String },
    #[error("Invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Relative URL '{path}' requires an environment base URL.")]
    MissingBaseUrl { path: String },
    #[error("Invalid header name '{name}'.")]
    InvalidHeaderName { name: String },
    #[error("Invalid value for header '{name}'.")]
    InvalidHeaderValue { name: String },
    #[error("Invalid auth configuration: {reason}")]
    InvalidAuth { reason: &'static str },
    #[error("Only one of --basic-auth, --bearer or --api-key may be set.")]
    AuthConflict,
    #[error("Unresolved variables: {names}")]
    UnresolvedVariables { names: String },
    #[error("Invalid header: {source}")]
    InvalidHeader {
        #[source]
        source: ValidationError,
    },
    #[error("Invalid query parameter: {source}")]
    InvalidQuery {
        #[source]
        source: ValidationError,
    },
    #[error("Invalid assertion #{index}: {source}")]
    InvalidAssertion {
        index: usize,
        #[source]
        source: ValidationError,
    },
    #[error("Invalid duration for '{field}': {source}")]
    InvalidDuration {
        field: String,
        #[source]
        source: ValidationError,
    },
    #[error("Config '{field}' must be >= 1: {source}")]
    FieldMustBePositive {
        field: String,
        #[source]
        source: ValidationError,
    },
    #[error("Concurrency {value} is outside 1..={max}.")]
    ConcurrencyOutOfRange { value: usize, max: usize },
    #[error("Iterations {value} is outside 1..={max}.")]
    IterationsOutOfRange { value: u64, max: u64 },
    #[error("Phase '{phase}' targets {value} VUs, above the cap of {max}.")]
    PhaseVusOutOfRange {
        phase: &'static str,
        value: u32,
        max: usize,
    },
    #[error("Phased load profile has no active time (every phase has zero duration or zero VUs).")]
    PhasedProfileEmpty,
    #[error("warmup_vus_percent must be within 0..=100, got {value}.")]
    InvalidWarmupPercent { value: u32 },
    #[error("Max concurrency must be within 1..={max}, got {value}.")]
    MaxConcurrencyOutOfRange { value: usize, max: usize },
    #[error("Chain must include at least one step.")]
    ChainMissingSteps,
    #[error("Bulk config must include at least one run.")]
    BulkMissingRuns,
    #[error("Bulk run '{name}' is invalid: {source}")]
    InvalidBulkRun {
        name: String,
        #[source]
        source: Box<ConfigError>,
    },
}
