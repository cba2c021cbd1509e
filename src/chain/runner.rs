use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::types::{ChainResult, ChainStep, Extraction, ExtractionSource, StepResult, StepStatus};
use crate::assertions::{lookup_json_path, value_to_text};
use crate::http::{Environment, RequestExecutor, ResponseCapture, Resolver};
use crate::metrics::{NETWORK_FAILURE_STATUS, duration_ms};
use crate::shutdown::{ShutdownReceiver, is_shutdown};

/// Runs chain steps one after another, feeding extracted values into the
/// templates of later steps.
pub struct ChainRunner {
    executor: Arc<dyn RequestExecutor>,
    environment: Environment,
    strict: bool,
    fail_on_http_error: bool,
    shutdown_rx: Option<ShutdownReceiver>,
}

impl ChainRunner {
    #[must_use]
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            executor,
            environment: Environment::default(),
            strict: false,
            fail_on_http_error: true,
            shutdown_rx: None,
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Whether a status of 400 or above fails a step. Network failures
    /// always do.
    #[must_use]
    pub const fn fail_on_http_error(mut self, enabled: bool) -> Self {
        self.fail_on_http_error = enabled;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown_rx: ShutdownReceiver) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    fn cancelled(&self) -> bool {
        self.shutdown_rx.as_ref().is_some_and(is_shutdown)
    }

    pub async fn run(
        &self,
        steps: &[ChainStep],
        global_variables: &BTreeMap<String, String>,
    ) -> ChainResult {
        let started = Instant::now();
        let resolver = Resolver::new(&self.environment).strict(self.strict);
        let mut variables = global_variables.clone();
        let mut results = Vec::with_capacity(steps.len());
        let mut halted = false;
        let mut cancelled = false;

        for (position, step) in steps.iter().enumerate() {
            if !halted && self.cancelled() {
                if !cancelled {
                    info!("Chain cancelled before step '{}'", step.name);
                }
                cancelled = true;
            }
            if halted || cancelled {
                results.push(StepResult::skipped(step));
                continue;
            }
            info!("Chain step {} '{}'", position.saturating_add(1), step.name);
            let step_started = Instant::now();

            let spec = match resolver.resolve(&step.request, &variables) {
                Ok(spec) => spec,
                Err(err) => {
                    warn!("Step '{}' could not be resolved: {}", step.name, err);
                    halted = step.stop_on_error;
                    results.push(StepResult {
                        status: StepStatus::Failed,
                        duration_ms: duration_ms(step_started.elapsed()),
                        error: Some(err.to_string()),
                        ..StepResult::skipped(step)
                    });
                    continue;
                }
            };

            let index = u64::try_from(position).unwrap_or(u64::MAX);
            let execution = self.executor.execute(index, &spec, true).await;
            let status = execution.measurement.status;
            let failed = status == NETWORK_FAILURE_STATUS
                || (self.fail_on_http_error && status >= 400);

            let mut extracted = BTreeMap::new();
            let mut missing = Vec::new();
            if let Some(response) = execution.response.as_ref() {
                apply_extractions(&step.extractions, response, &mut extracted, &mut missing);
            } else {
                missing.extend(
                    step.extractions
                        .iter()
                        .map(|extraction| extraction.variable_name.clone()),
                );
            }
            variables.extend(
                extracted
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );

            let error = execution.measurement.error.clone().or_else(|| {
                failed.then(|| format!("HTTP status {}", status))
            });
            if failed {
                debug!("Step '{}' failed: {:?}", step.name, error);
                halted = step.stop_on_error;
            }

            results.push(StepResult {
                id: step.id.clone(),
                name: step.name.clone(),
                status: if failed {
                    StepStatus::Failed
                } else {
                    StepStatus::Passed
                },
                stop_on_error: step.stop_on_error,
                url: Some(spec.url.to_string()),
                http_status: (status != NETWORK_FAILURE_STATUS).then_some(status),
                duration_ms: execution.measurement.total_time,
                error,
                extracted,
                missing_extractions: missing,
                measurement: Some(execution.measurement),
            });
        }

        let success = !cancelled
            && !results
                .iter()
                .any(|result| result.status == StepStatus::Failed && result.stop_on_error);

        ChainResult {
            success,
            cancelled,
            steps: results,
            variables,
            total_duration_ms: duration_ms(started.elapsed()),
        }
    }
}

/// Evaluates every extraction against one response. Failed lookups leave
/// the variable unset.
fn apply_extractions(
    extractions: &[Extraction],
    response: &ResponseCapture,
    extracted: &mut BTreeMap<String, String>,
    missing: &mut Vec<String>,
) {
    let body_json: Option<serde_json::Value> = extractions
        .iter()
        .any(|extraction| extraction.source == ExtractionSource::Body)
        .then(|| serde_json::from_str(&response.body).ok())
        .flatten();

    for extraction in extractions {
        let value = match extraction.source {
            ExtractionSource::Body => body_json
                .as_ref()
                .and_then(|json| lookup_json_path(json, &extraction.path))
                .map(value_to_text),
            ExtractionSource::Header => response.header(extraction.path.trim()).map(str::to_owned),
            ExtractionSource::Status => Some(response.status.to_string()),
        };
        match value {
            Some(value) => {
                extracted.insert(extraction.variable_name.clone(), value);
            }
            None => missing.push(extraction.variable_name.clone()),
        }
    }
}
