use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::args::{BodyContentType, HttpMethod, OutputFormat};
use crate::assertions::AssertionRule;
use crate::chain::Extraction;
use crate::error::ValidationError;
use crate::http::{AuthDescriptor, Environment};

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub request: Option<RequestConfig>,
    pub environment: Option<Environment>,
    pub variables: Option<BTreeMap<String, String>>,
    pub strict_variables: Option<bool>,
    pub load: Option<LoadConfig>,
    pub timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
    pub max_concurrency: Option<usize>,
    pub cache_header: Option<String>,
    pub cache_hit_values: Option<Vec<String>>,
    pub insecure: Option<bool>,
    pub redirect: Option<u32>,
    pub disable_keepalive: Option<bool>,
    pub no_ua: Option<bool>,
    pub max_samples: Option<usize>,
    pub request_list_cap: Option<usize>,
    pub assertions: Option<Vec<AssertionRule>>,
    pub output_format: Option<OutputFormat>,
    pub export_json: Option<String>,
    pub steps: Option<Vec<ChainStepConfig>>,
    pub fail_on_http_error: Option<bool>,
    pub runs: Option<Vec<BulkRunConfig>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RequestConfig {
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    /// `Key: Value` strings, same syntax as `-H`.
    pub headers: Option<Vec<String>>,
    /// `key=value` strings, same syntax as `--query`.
    pub query: Option<Vec<String>>,
    pub body: Option<String>,
    pub body_type: Option<BodyContentType>,
    pub auth: Option<AuthDescriptor>,
}

/// `concurrency`/`iterations` for a flat run; `max_vus` or `phased` switch
/// to a phased run.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoadConfig {
    pub concurrency: Option<usize>,
    pub iterations: Option<u64>,
    pub max_vus: Option<u32>,
    pub warmup_vus_percent: Option<u32>,
    pub warmup: Option<DurationValue>,
    pub ramp_up: Option<DurationValue>,
    pub sustain: Option<DurationValue>,
    pub ramp_down: Option<DurationValue>,
    pub phased: Option<PhasedConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PhasedConfig {
    pub warmup: Option<PhaseConfig>,
    pub ramp_up: Option<PhaseConfig>,
    pub sustain: Option<PhaseConfig>,
    pub ramp_down: Option<PhaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhaseConfig {
    pub duration: DurationValue,
    #[serde(default, alias = "target_vus")]
    pub vus: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainStepConfig {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(flatten)]
    pub request: RequestConfig,
    #[serde(default, alias = "extractions")]
    pub extract: Vec<Extraction>,
    pub stop_on_error: Option<bool>,
}

/// One named entry of a bulk file. Unset fields fall back to the file's
/// top-level values.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkRunConfig {
    pub name: String,
    pub request: Option<RequestConfig>,
    pub load: Option<LoadConfig>,
    pub variables: Option<BTreeMap<String, String>>,
    pub assertions: Option<Vec<AssertionRule>>,
    pub timeout: Option<DurationValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        self.to_duration_allowing_zero(false)
    }

    pub(crate) fn to_phase_duration(&self) -> Result<Duration, ValidationError> {
        self.to_duration_allowing_zero(true)
    }

    fn to_duration_allowing_zero(&self, allow_zero: bool) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 && !allow_zero {
                    Err(ValidationError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => super::parse_duration_value(text, allow_zero),
        }
    }
}
