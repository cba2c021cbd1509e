use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::http::RequestTemplate;
use crate::metrics::RequestMeasurement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    Body,
    Header,
    Status,
}

impl FromStr for ExtractionSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "body" | "json" => Ok(ExtractionSource::Body),
            "header" => Ok(ExtractionSource::Header),
            "status" => Ok(ExtractionSource::Status),
            _ => Err(ValidationError::UnknownExtractionSource {
                value: s.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(alias = "variable")]
    pub variable_name: String,
    pub source: ExtractionSource,
    /// JSON path for `body`, header name for `header`, unused for `status`.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStep {
    pub id: String,
    pub name: String,
    pub request: RequestTemplate,
    pub extractions: Vec<Extraction>,
    pub stop_on_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Not run because an earlier step halted the chain.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub id: String,
    pub name: String,
    pub status: StepStatus,
    pub stop_on_error: bool,
    pub url: Option<String>,
    pub http_status: Option<u16>,
    pub duration_ms: f64,
    pub error: Option<String>,
    pub extracted: BTreeMap<String, String>,
    /// Extractions that found nothing; those variables stay unset.
    pub missing_extractions: Vec<String>,
    pub measurement: Option<RequestMeasurement>,
}

impl StepResult {
    pub(crate) fn skipped(step: &ChainStep) -> Self {
        Self {
            id: step.id.clone(),
            name: step.name.clone(),
            status: StepStatus::Skipped,
            stop_on_error: step.stop_on_error,
            url: None,
            http_status: None,
            duration_ms: 0.0,
            error: None,
            extracted: BTreeMap::new(),
            missing_extractions: Vec::new(),
            measurement: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResult {
    /// False when a required step failed or the chain was cancelled
    /// before every step ran.
    pub success: bool,
    #[serde(default)]
    pub cancelled: bool,
    pub steps: Vec<StepResult>,
    pub variables: BTreeMap<String, String>,
    pub total_duration_ms: f64,
}
