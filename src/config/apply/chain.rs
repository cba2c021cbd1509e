use std::collections::BTreeMap;

use crate::chain::ChainStep;
use crate::error::{AppError, AppResult, ConfigError};
use crate::http::{Environment, ExecutorSettings};

use super::super::types::{ChainStepConfig, ConfigFile};
use super::executor_settings;
use super::request::{ensure_url, template_from_config};

/// A chain file turned into runnable steps plus the context they share.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainPlan {
    pub steps: Vec<ChainStep>,
    pub environment: Environment,
    pub variables: BTreeMap<String, String>,
    pub strict_variables: bool,
    pub fail_on_http_error: bool,
    pub executor: ExecutorSettings,
}

/// Builds a chain plan from a config file with `[[steps]]`.
///
/// `extra_variables` come from `--var` and override the file's
/// `[variables]`.
///
/// # Errors
///
/// Returns an error when the file has no steps, a step has no URL or an
/// invalid header/query entry, or transport settings are invalid.
pub fn build_chain_plan(
    config: &ConfigFile,
    extra_variables: &[(String, String)],
) -> AppResult<ChainPlan> {
    let Some(step_configs) = config.steps.as_deref().filter(|steps| !steps.is_empty()) else {
        return Err(AppError::config(ConfigError::ChainMissingSteps));
    };

    let mut steps = Vec::with_capacity(step_configs.len());
    for (position, step) in step_configs.iter().enumerate() {
        steps.push(chain_step(step, position)?);
    }

    let mut variables = config.variables.clone().unwrap_or_default();
    variables.extend(extra_variables.iter().cloned());

    Ok(ChainPlan {
        steps,
        environment: config.environment.clone().unwrap_or_default(),
        variables,
        strict_variables: config.strict_variables.unwrap_or(false),
        fail_on_http_error: config.fail_on_http_error.unwrap_or(true),
        executor: executor_settings(config)?,
    })
}

fn chain_step(step: &ChainStepConfig, position: usize) -> AppResult<ChainStep> {
    let request = template_from_config(&step.request)?;
    ensure_url(&request)?;
    let id = step
        .id
        .clone()
        .unwrap_or_else(|| format!("step-{}", position.saturating_add(1)));
    let name = step
        .name
        .clone()
        .unwrap_or_else(|| format!("{} {}", request.method.as_str(), request.url));
    Ok(ChainStep {
        id,
        name,
        request,
        extractions: step.extract.clone(),
        stop_on_error: step.stop_on_error.unwrap_or(true),
    })
}
