use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use super::defaults::DEFAULT_REGRESSION_THRESHOLD;
use super::parsers::{
    parse_assertion, parse_credentials, parse_duration_arg, parse_header, parse_key_value,
    parse_phase_duration, parse_positive_u64, parse_positive_usize,
};
use super::types::{BodyContentType, HttpMethod, OutputFormat, PositiveU64, PositiveUsize};
use crate::assertions::AssertionRule;
use crate::http::{DEFAULT_CACHE_HEADER, DEFAULT_REDIRECT_LIMIT};
use crate::load::{DEFAULT_MAX_CONCURRENCY, DEFAULT_WARMUP_VUS_PERCENT};

#[derive(Debug, Parser, Clone)]
#[clap(
    name = "loadlens",
    version,
    about = "API load testing and performance analysis - virtual users, phased ramps, timing breakdowns, percentiles, assertions and request chains."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging (overridden by LOADLENS_LOG / RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a load test against one endpoint
    Run(Box<RunArgs>),
    /// Run a request chain with variable extraction
    Chain(ChainArgs),
    /// Run several named load tests one after another
    Bulk(BulkArgs),
    /// Compare two exported run reports
    Compare(CompareArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Config file (TOML or JSON); defaults to ./loadlens.toml or ./loadlens.json
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Target URL; a path starting with '/' is joined to --base-url
    #[arg(long, short = 'u')]
    pub url: Option<String>,

    /// HTTP method
    #[arg(long, short = 'X', value_enum, default_value_t = HttpMethod::Get)]
    pub method: HttpMethod,

    /// Request header 'Key: Value' (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Query parameter 'key=value' (repeatable)
    #[arg(long = "query", short = 'q', value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,

    /// Request body
    #[arg(long, short = 'd', default_value = "")]
    pub data: String,

    /// How the body is declared (sets Content-Type unless a header does)
    #[arg(long = "body-type", value_enum, default_value_t = BodyContentType::None)]
    pub body_type: BodyContentType,

    /// Basic auth 'username:password'
    #[arg(long = "basic-auth", value_parser = parse_credentials)]
    pub basic_auth: Option<(String, String)>,

    /// Bearer token
    #[arg(long)]
    pub bearer: Option<String>,

    /// API key header 'Header-Name: value'
    #[arg(long = "api-key", value_parser = parse_header)]
    pub api_key: Option<(String, String)>,

    /// Environment base URL for relative request paths
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Template variable 'name=value' (repeatable)
    #[arg(long = "var", value_parser = parse_key_value)]
    pub variables: Vec<(String, String)>,

    /// Fail instead of sending unresolved {{placeholders}}
    #[arg(long = "strict-variables")]
    pub strict_variables: bool,

    /// Virtual users for a flat run
    #[arg(long, short = 'n', default_value = "1", value_parser = parse_positive_usize)]
    pub concurrency: PositiveUsize,

    /// Sequential requests per virtual user for a flat run
    #[arg(long, short = 'i', default_value = "1", value_parser = parse_positive_u64)]
    pub iterations: PositiveU64,

    /// Peak VUs; switches to a phased run
    #[arg(long = "max-vus")]
    pub max_vus: Option<u32>,

    /// Warmup VUs as a percentage of --max-vus
    #[arg(long = "warmup-vus-percent", default_value_t = DEFAULT_WARMUP_VUS_PERCENT)]
    pub warmup_vus_percent: u32,

    /// Warmup phase length (supports ms/s/m/h, 0 skips)
    #[arg(long, default_value = "0s", value_parser = parse_phase_duration)]
    pub warmup: Duration,

    /// Ramp-up phase length
    #[arg(long = "ramp-up", default_value = "0s", value_parser = parse_phase_duration)]
    pub ramp_up: Duration,

    /// Sustain phase length
    #[arg(long, default_value = "0s", value_parser = parse_phase_duration)]
    pub sustain: Duration,

    /// Ramp-down phase length
    #[arg(long = "ramp-down", default_value = "0s", value_parser = parse_phase_duration)]
    pub ramp_down: Duration,

    /// Per-request timeout (supports ms/s/m/h)
    #[arg(long, short = 't', default_value = "30s", value_parser = parse_duration_arg)]
    pub timeout: Duration,

    /// Upper bound on concurrent virtual users
    #[arg(long = "max-concurrency", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Response header used for cache HIT/MISS classification
    #[arg(long = "cache-header", default_value = DEFAULT_CACHE_HEADER)]
    pub cache_header: String,

    /// Header value prefix meaning HIT (repeatable, default HIT)
    #[arg(long = "cache-hit-value")]
    pub cache_hit_values: Vec<String>,

    /// Assertion 'type[:field] operator [expected]' (repeatable)
    #[arg(long = "assert", value_parser = parse_assertion)]
    pub assertions: Vec<AssertionRule>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Maximum redirects to follow (0 disables)
    #[arg(long, default_value_t = DEFAULT_REDIRECT_LIMIT)]
    pub redirect: u32,

    /// Do not send a User-Agent header
    #[arg(long = "no-ua")]
    pub no_ua: bool,

    /// Summary format
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Write the full report as JSON
    #[arg(long = "export-json")]
    pub export_json: Option<String>,

    /// Disable the live progress line
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ChainArgs {
    /// Chain config file (TOML or JSON) with [[steps]]
    #[arg(long, short = 'c')]
    pub config: String,

    /// Extra global variable 'name=value' (repeatable)
    #[arg(long = "var", value_parser = parse_key_value)]
    pub variables: Vec<(String, String)>,

    /// Summary format
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Write the chain result as JSON
    #[arg(long = "export-json")]
    pub export_json: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct BulkArgs {
    /// Bulk config file (TOML or JSON) with [[runs]]
    #[arg(long, short = 'c')]
    pub config: String,

    /// Summary format
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Write all results as JSON
    #[arg(long = "export-json")]
    pub export_json: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    /// Baseline report (from --export-json)
    pub baseline: String,

    /// Candidate report
    pub candidate: String,

    /// Percent change that counts as a regression
    #[arg(long, default_value_t = DEFAULT_REGRESSION_THRESHOLD)]
    pub threshold: f64,

    /// Summary format
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,
}
