use std::path::Path;
use std::sync::Arc;

use clap::ArgMatches;
use tracing::{error, info};

use crate::args::{BulkArgs, ChainArgs, OutputFormat, RunArgs};
use crate::chain::ChainRunner;
use crate::config::{
    OutputSettings, build_bulk_entries, build_chain_plan, build_run_request, load_config,
    load_config_file, output_settings,
};
use crate::engine::{RunOutcome, run_bulk, run_load_test};
use crate::error::AppResult;
use crate::http::{ExecutorFactory, HttpExecutor, HttpExecutorFactory};
use crate::load::ProgressReporter;
use crate::shutdown::ShutdownSender;

use super::export::export_json;
use super::progress::setup_progress_indicator;
use super::summary::{bulk_lines, chain_lines, print_json, print_lines, summary_lines};

/// Runs `loadlens run`. Returns whether the run succeeded.
pub(crate) async fn run_load(
    args: &RunArgs,
    matches: &ArgMatches,
    no_color: bool,
    shutdown_tx: &ShutdownSender,
) -> AppResult<bool> {
    let config = load_config(args.config.as_deref())?;
    let output = output_settings(
        matches,
        args.output_format,
        args.export_json.as_deref(),
        config.as_ref(),
    );
    let request = match build_run_request(args, matches, config.as_ref()) {
        Ok(request) => request,
        Err(err) => {
            report_config_failure(&output, &err.to_string())?;
            return Err(err);
        }
    };

    let executors = HttpExecutorFactory::new(request.executor.clone());
    let (progress, progress_rx) = ProgressReporter::new();
    let progress_handle = (!args.no_progress && output.format == OutputFormat::Text)
        .then(|| setup_progress_indicator(progress_rx, no_color));

    let result = run_load_test(request, &executors, shutdown_tx.subscribe(), progress).await;
    if let Some(handle) = progress_handle {
        drop(handle.await);
    }
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            report_config_failure(&output, &err.to_string())?;
            return Err(err);
        }
    };

    match output.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_lines(&summary_lines(&report)?),
    }
    if let Some(path) = output.export_json.as_deref() {
        export_json(path, &report).await?;
    }
    Ok(report.success)
}

fn report_config_failure(output: &OutputSettings, message: &str) -> AppResult<()> {
    error!("Run not started: {}", message);
    if output.format == OutputFormat::Json {
        print_json(&RunOutcome::Failed {
            error: message.to_owned(),
        })?;
    }
    Ok(())
}

/// Runs `loadlens chain`. Returns whether every halting step passed.
pub(crate) async fn run_chain(
    args: &ChainArgs,
    matches: &ArgMatches,
    shutdown_tx: &ShutdownSender,
) -> AppResult<bool> {
    let config = load_config_file(Path::new(&args.config))?;
    let output = output_settings(
        matches,
        args.output_format,
        args.export_json.as_deref(),
        Some(&config),
    );
    let plan = build_chain_plan(&config, &args.variables)?;
    let executor = Arc::new(HttpExecutor::new(&plan.executor)?);
    let runner = ChainRunner::new(executor)
        .with_environment(plan.environment)
        .strict(plan.strict_variables)
        .fail_on_http_error(plan.fail_on_http_error)
        .with_shutdown(shutdown_tx.subscribe());

    info!("Running chain with {} step(s)", plan.steps.len());
    let result = runner.run(&plan.steps, &plan.variables).await;

    match output.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_lines(&chain_lines(&result)?),
    }
    if let Some(path) = output.export_json.as_deref() {
        export_json(path, &result).await?;
    }
    Ok(result.success)
}

/// Runs `loadlens bulk`. Succeeds only when every entry ran and passed.
pub(crate) async fn run_bulk_command(
    args: &BulkArgs,
    matches: &ArgMatches,
    shutdown_tx: &ShutdownSender,
) -> AppResult<bool> {
    let config = load_config_file(Path::new(&args.config))?;
    let output = output_settings(
        matches,
        args.output_format,
        args.export_json.as_deref(),
        Some(&config),
    );
    let entries = build_bulk_entries(&config)?;

    let results = run_bulk(
        entries,
        |request| -> Arc<dyn ExecutorFactory> {
            Arc::new(HttpExecutorFactory::new(request.executor.clone()))
        },
        shutdown_tx.subscribe(),
    )
    .await;

    match output.format {
        OutputFormat::Json => print_json(&results)?,
        OutputFormat::Text => print_lines(&bulk_lines(&results)),
    }
    if let Some(path) = output.export_json.as_deref() {
        export_json(path, &results).await?;
    }
    Ok(results.iter().all(|entry| {
        entry
            .outcome
            .as_ref()
            .and_then(RunOutcome::report)
            .is_some_and(|report| report.success)
    }))
}
