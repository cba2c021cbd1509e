mod chain;
mod load;
mod request;
mod util;

use clap::ArgMatches;

use crate::args::{OutputFormat, RunArgs};
use crate::engine::{BulkEntry, RunRequest};
use crate::error::{AppError, AppResult, ConfigError};
use crate::http::{CacheRule, DEFAULT_CACHE_HEADER, DEFAULT_CACHE_HIT_VALUES, ExecutorSettings};
use crate::metrics::{DEFAULT_MAX_SAMPLES, DEFAULT_REQUEST_LIST_CAP};

use super::types::{BulkRunConfig, ConfigFile, LoadConfig, RequestConfig};
use load::{LoadOverrides, resolve_profile};
use request::{apply_cli_request, ensure_url, template_from_config};
use util::{duration_field, is_cli, validate_assertions};

pub use chain::{ChainPlan, build_chain_plan};

/// Where a command's summary goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub export_json: Option<String>,
}

/// Builds the run request for `loadlens run`.
///
/// Values given explicitly on the command line win, then the config file,
/// then the command-line defaults.
///
/// # Errors
///
/// Returns an error when no URL is configured, config values are invalid,
/// or flat and phased load options are mixed.
pub fn build_run_request(
    args: &RunArgs,
    matches: &ArgMatches,
    config: Option<&ConfigFile>,
) -> AppResult<RunRequest> {
    let fallback = ConfigFile::default();
    let config = config.unwrap_or(&fallback);

    let mut template = match config.request.as_ref() {
        Some(request) => template_from_config(request)?,
        None => template_from_config(&RequestConfig::default())?,
    };
    apply_cli_request(&mut template, args, matches)?;
    ensure_url(&template)?;

    let overrides = LoadOverrides {
        concurrency: is_cli(matches, "concurrency").then_some(args.concurrency.get()),
        iterations: is_cli(matches, "iterations").then_some(args.iterations.get()),
        max_vus: args.max_vus,
        warmup_vus_percent: is_cli(matches, "warmup_vus_percent")
            .then_some(args.warmup_vus_percent),
        durations: [
            is_cli(matches, "warmup").then_some(args.warmup),
            is_cli(matches, "ramp_up").then_some(args.ramp_up),
            is_cli(matches, "sustain").then_some(args.sustain),
            is_cli(matches, "ramp_down").then_some(args.ramp_down),
        ],
    };
    let profile = match config.load.as_ref() {
        Some(load) => resolve_profile(load, &overrides)?,
        None => resolve_profile(&LoadConfig::default(), &overrides)?,
    };

    let mut request = RunRequest::new(template, profile);
    request.environment = config.environment.clone().unwrap_or_default();
    if let Some(base_url) = args.base_url.clone() {
        request.environment.base_url = Some(base_url);
    }
    request.variables = config.variables.clone().unwrap_or_default();
    request.variables.extend(args.variables.iter().cloned());
    request.strict_variables =
        args.strict_variables || config.strict_variables.unwrap_or(false);

    request.max_concurrency = if is_cli(matches, "max_concurrency") {
        args.max_concurrency
    } else {
        config.max_concurrency.unwrap_or(args.max_concurrency)
    };

    request.executor = executor_settings(config)?;
    apply_cli_transport(&mut request.executor, args, matches);

    request.assertions = if is_cli(matches, "assertions") {
        args.assertions.clone()
    } else {
        let rules = config.assertions.clone().unwrap_or_default();
        validate_assertions(&rules)?;
        rules
    };
    request.max_samples = config.max_samples.unwrap_or(DEFAULT_MAX_SAMPLES);
    request.request_list_cap = config.request_list_cap.unwrap_or(DEFAULT_REQUEST_LIST_CAP);
    Ok(request)
}

/// Builds the named entries of a bulk file. Each `[[runs]]` entry inherits
/// the file's top-level request, load, variables, assertions and transport
/// settings and overrides what it sets.
///
/// # Errors
///
/// Returns an error when the file has no runs or an entry is invalid.
pub fn build_bulk_entries(config: &ConfigFile) -> AppResult<Vec<BulkEntry>> {
    let Some(runs) = config.runs.as_deref().filter(|runs| !runs.is_empty()) else {
        return Err(AppError::config(ConfigError::BulkMissingRuns));
    };

    let mut entries = Vec::with_capacity(runs.len());
    for run in runs {
        let request = bulk_request(config, run).map_err(|err| {
            if let AppError::Config(source) = err {
                AppError::config(ConfigError::InvalidBulkRun {
                    name: run.name.clone(),
                    source: Box::new(source),
                })
            } else {
                err
            }
        })?;
        entries.push(BulkEntry {
            name: run.name.clone(),
            request,
        });
    }
    Ok(entries)
}

fn bulk_request(config: &ConfigFile, run: &BulkRunConfig) -> AppResult<RunRequest> {
    let fallback = RequestConfig::default();
    let base = config.request.as_ref().unwrap_or(&fallback);
    let merged = match run.request.as_ref() {
        Some(over) => merge_request(base, over),
        None => base.clone(),
    };
    let template = template_from_config(&merged)?;
    ensure_url(&template)?;

    let load = run
        .load
        .as_ref()
        .or(config.load.as_ref())
        .cloned()
        .unwrap_or_default();
    let profile = resolve_profile(&load, &LoadOverrides::default())?;

    let mut request = RunRequest::new(template, profile);
    request.environment = config.environment.clone().unwrap_or_default();
    request.variables = config.variables.clone().unwrap_or_default();
    if let Some(variables) = run.variables.as_ref() {
        request.variables.extend(variables.clone());
    }
    request.strict_variables = config.strict_variables.unwrap_or(false);
    if let Some(max_concurrency) = config.max_concurrency {
        request.max_concurrency = max_concurrency;
    }
    request.executor = executor_settings(config)?;
    if let Some(timeout) = run.timeout.as_ref() {
        request.executor.client.timeout = duration_field(timeout, "runs.timeout")?;
    }
    request.assertions = run
        .assertions
        .as_ref()
        .or(config.assertions.as_ref())
        .cloned()
        .unwrap_or_default();
    validate_assertions(&request.assertions)?;
    request.max_samples = config.max_samples.unwrap_or(DEFAULT_MAX_SAMPLES);
    request.request_list_cap = config.request_list_cap.unwrap_or(DEFAULT_REQUEST_LIST_CAP);
    Ok(request)
}

fn merge_request(base: &RequestConfig, over: &RequestConfig) -> RequestConfig {
    RequestConfig {
        url: over.url.clone().or_else(|| base.url.clone()),
        method: over.method.or(base.method),
        headers: over.headers.clone().or_else(|| base.headers.clone()),
        query: over.query.clone().or_else(|| base.query.clone()),
        body: over.body.clone().or_else(|| base.body.clone()),
        body_type: over.body_type.or(base.body_type),
        auth: over.auth.clone().or_else(|| base.auth.clone()),
    }
}

/// Transport and cache settings from the config file over library defaults.
fn executor_settings(config: &ConfigFile) -> AppResult<ExecutorSettings> {
    let mut settings = ExecutorSettings::default();
    if let Some(timeout) = config.timeout.as_ref() {
        settings.client.timeout = duration_field(timeout, "timeout")?;
    }
    if let Some(connect_timeout) = config.connect_timeout.as_ref() {
        settings.client.connect_timeout = Some(duration_field(connect_timeout, "connect_timeout")?);
    }
    if let Some(redirect) = config.redirect {
        settings.client.redirect_limit = redirect;
    }
    if let Some(insecure) = config.insecure {
        settings.client.insecure = insecure;
    }
    if let Some(disable_keepalive) = config.disable_keepalive {
        settings.client.disable_keepalive = disable_keepalive;
    }
    if config.no_ua == Some(true) {
        settings.client.user_agent = None;
    }
    settings.cache_rule = cache_rule(
        config.cache_header.clone(),
        config.cache_hit_values.clone().unwrap_or_default(),
    );
    Ok(settings)
}

fn apply_cli_transport(settings: &mut ExecutorSettings, args: &RunArgs, matches: &ArgMatches) {
    if is_cli(matches, "timeout") {
        settings.client.timeout = args.timeout;
    }
    if is_cli(matches, "redirect") {
        settings.client.redirect_limit = args.redirect;
    }
    if args.insecure {
        settings.client.insecure = true;
    }
    if args.no_ua {
        settings.client.user_agent = None;
    }
    if is_cli(matches, "cache_header") || is_cli(matches, "cache_hit_values") {
        let header = is_cli(matches, "cache_header").then(|| args.cache_header.clone());
        settings.cache_rule = cache_rule(header, args.cache_hit_values.clone());
    }
}

fn cache_rule(header: Option<String>, hit_values: Vec<String>) -> CacheRule {
    let header = header
        .filter(|header| !header.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CACHE_HEADER.to_owned());
    let hit_values: Vec<String> = hit_values
        .into_iter()
        .filter(|value| !value.trim().is_empty())
        .collect();
    let hit_values = if hit_values.is_empty() {
        DEFAULT_CACHE_HIT_VALUES
            .iter()
            .map(|value| (*value).to_owned())
            .collect()
    } else {
        hit_values
    };
    CacheRule::new(header, hit_values)
}

/// Output format and export path, command line first.
#[must_use]
pub fn output_settings(
    matches: &ArgMatches,
    format: OutputFormat,
    export_json: Option<&str>,
    config: Option<&ConfigFile>,
) -> OutputSettings {
    let format = if is_cli(matches, "output_format") {
        format
    } else {
        config
            .and_then(|config| config.output_format)
            .unwrap_or(format)
    };
    let export_json = export_json
        .map(str::to_owned)
        .or_else(|| config.and_then(|config| config.export_json.clone()));
    OutputSettings {
        format,
        export_json,
    }
}

