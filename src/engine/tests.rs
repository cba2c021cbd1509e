use super::*;
use crate::assertions::{AssertionKind, AssertionOperator, AssertionRule};
use crate::error::{AppError, AppResult, ConfigError};
use crate::http::{ExecutorFactory, RequestTemplate};
use crate::load::{LoadProfile, PhaseSpec, PhasedProfile, ProgressReporter, RunState};
use crate::shutdown::{request_shutdown, shutdown_channel};
use crate::test_support::{ScriptedExecutor, ScriptedFactory, run_async_test};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn flat(concurrency: usize, iterations: u64) -> LoadProfile {
    LoadProfile::Flat {
        concurrency,
        iterations,
    }
}

fn request(profile: LoadProfile) -> RunRequest {
    RunRequest::new(RequestTemplate::get("http://api.local/items"), profile)
}

#[test]
fn flat_run_reports_stats_and_assertions() -> AppResult<()> {
    run_async_test(async {
        let executor = ScriptedExecutor::ok(Duration::from_millis(2));
        let factory = ScriptedFactory::new(Arc::clone(&executor));
        let mut run = request(flat(2, 5));
        run.assertions = vec![
            AssertionRule::new(AssertionKind::StatusCode, AssertionOperator::Equals, "200"),
            AssertionRule::new(AssertionKind::JsonPath, AssertionOperator::Equals, "true")
                .with_field("$.ok"),
        ];
        let (_shutdown_tx, shutdown_rx) = shutdown_channel();
        let (progress, _progress_rx) = ProgressReporter::new();

        let report = run_load_test(run, factory.as_ref(), shutdown_rx, progress).await?;
        if !report.success || report.cancelled || report.state != RunState::Completed {
            return Err(AppError::validation(format!("Unexpected report: {:?}", report)));
        }
        if report.stats.requests != 10 || report.stats.success_count != 10 {
            return Err(AppError::validation(format!("Unexpected stats: {:?}", report.stats)));
        }
        if report.assertions_passed != 2 || report.assertions_total != 2 {
            return Err(AppError::validation(format!(
                "Unexpected assertions: {:?}",
                report.assertions
            )));
        }
        if report.first_response.as_ref().map(|response| response.status) != Some(200) {
            return Err(AppError::validation("Expected a captured response"));
        }
        if report.requests.len() != 10 || executor.calls() != 10 {
            return Err(AppError::validation("Every request should be listed"));
        }
        Ok(())
    })
}

#[test]
fn failed_assertion_fails_the_run() -> AppResult<()> {
    run_async_test(async {
        let factory = ScriptedFactory::new(ScriptedExecutor::ok(Duration::ZERO));
        let mut run = request(flat(1, 2));
        run.assertions = vec![AssertionRule::new(
            AssertionKind::StatusCode,
            AssertionOperator::Equals,
            "201",
        )];
        let (_shutdown_tx, shutdown_rx) = shutdown_channel();
        let (progress, _progress_rx) = ProgressReporter::new();
        let report = run_load_test(run, factory.as_ref(), shutdown_rx, progress).await?;
        if report.success || report.assertions_passed != 0 || report.stats.requests != 2 {
            return Err(AppError::validation(format!("Unexpected report: {:?}", report)));
        }
        Ok(())
    })
}

#[test]
fn errors_are_counted_not_raised() -> AppResult<()> {
    run_async_test(async {
        let executor = ScriptedExecutor::new(Duration::ZERO, |spec| {
            if spec.url.query() == Some("fail=1") {
                (0, String::new())
            } else {
                (503, "{}".to_owned())
            }
        });
        let factory = ScriptedFactory::new(executor);
        let mut run = request(flat(1, 3));
        run.template.query_params = vec![("fail".to_owned(), "1".to_owned())];
        let (_shutdown_tx, shutdown_rx) = shutdown_channel();
        let (progress, _progress_rx) = ProgressReporter::new();
        let report = run_load_test(run, factory.as_ref(), shutdown_rx, progress).await?;
        if report.stats.error_count != 3 || report.stats.status_codes.get(&0) != Some(&3) {
            return Err(AppError::validation(format!("Unexpected stats: {:?}", report.stats)));
        }
        // No assertions and not cancelled: the run still counts as a success.
        if !report.success {
            return Err(AppError::validation("Run with requests should succeed"));
        }
        Ok(())
    })
}

#[test]
fn config_errors_surface_before_any_request() -> AppResult<()> {
    run_async_test(async {
        let executor = ScriptedExecutor::ok(Duration::ZERO);
        let factory = ScriptedFactory::new(Arc::clone(&executor));
        let mut run = request(flat(2, 2));
        run.template = RequestTemplate::get("http://api.local/{{missing}}");
        run.strict_variables = true;
        let (_shutdown_tx, shutdown_rx) = shutdown_channel();
        let (progress, _progress_rx) = ProgressReporter::new();

        let result = run_load_test(run, factory.as_ref(), shutdown_rx, progress).await;
        let Err(AppError::Config(ConfigError::UnresolvedVariables { .. })) = result else {
            return Err(AppError::validation("Expected unresolved variables"));
        };
        if executor.calls() != 0 || factory.lanes_built.load(Ordering::SeqCst) != 0 {
            return Err(AppError::validation("Nothing should have been sent"));
        }

        let (_shutdown_tx, shutdown_rx) = shutdown_channel();
        let (progress, _progress_rx) = ProgressReporter::new();
        let phased = request(LoadProfile::Phased(PhasedProfile {
            sustain: PhaseSpec::new(Duration::from_secs(1), 1000),
            ..PhasedProfile::default()
        }));
        let result = run_load_test(phased, factory.as_ref(), shutdown_rx, progress).await;
        let Err(AppError::Config(ConfigError::PhaseVusOutOfRange { .. })) = result else {
            return Err(AppError::validation("Expected phase VU error"));
        };
        Ok(())
    })
}

#[test]
fn cancelled_run_returns_partial_report() -> AppResult<()> {
    run_async_test(async {
        let executor = ScriptedExecutor::ok(Duration::from_millis(10));
        let factory: Arc<dyn ExecutorFactory> = ScriptedFactory::new(executor);
        let handle = spawn_run_with(request(flat(2, 1000)), factory);
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.cancel();
        let report = handle.join().await?;
        if report.success || !report.cancelled || report.state != RunState::Aborted {
            return Err(AppError::validation(format!("Unexpected state: {:?}", report.state)));
        }
        if report.stats.requests == 0 || report.stats.requests >= 2000 {
            return Err(AppError::validation(format!(
                "Unexpected request count: {}",
                report.stats.requests
            )));
        }
        Ok(())
    })
}

#[test]
fn outcome_serializes_report_or_error() -> AppResult<()> {
    let failed = RunOutcome::from_result(Err(AppError::config(ConfigError::MissingUrl)));
    let json = serde_json::to_value(&failed)?;
    let message = json
        .get("error")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    if message.is_empty() || failed.report().is_some() {
        return Err(AppError::validation(format!("Unexpected failure json: {}", json)));
    }
    let parsed: RunOutcome = serde_json::from_value(json)?;
    if parsed != failed {
        return Err(AppError::validation("Failure should parse back"));
    }

    run_async_test(async {
        let factory = ScriptedFactory::new(ScriptedExecutor::ok(Duration::ZERO));
        let (_shutdown_tx, shutdown_rx) = shutdown_channel();
        let (progress, _progress_rx) = ProgressReporter::new();
        let report = run_load_test(request(flat(1, 1)), factory.as_ref(), shutdown_rx, progress)
            .await?;
        let json = serde_json::to_value(RunOutcome::Completed(Box::new(report)))?;
        for key in [
            "success",
            "stats",
            "timeSeries",
            "bottleneck",
            "assertions_passed",
            "assertions_total",
            "testing",
        ] {
            if json.get(key).is_none() {
                return Err(AppError::validation(format!("Missing key {}", key)));
            }
        }
        let parsed: RunOutcome = serde_json::from_value(json)?;
        if parsed.report().map(|report| report.stats.requests) != Some(1) {
            return Err(AppError::validation("Report should parse back"));
        }
        Ok(())
    })
}

#[test]
fn bulk_isolates_failures_and_skips_after_cancel() -> AppResult<()> {
    run_async_test(async {
        let executor = ScriptedExecutor::ok(Duration::ZERO);
        let factory: Arc<dyn ExecutorFactory> = ScriptedFactory::new(executor);
        let mut broken = request(flat(1, 1));
        broken.template = RequestTemplate::get("/relative");
        let entries = vec![
            BulkEntry {
                name: "broken".to_owned(),
                request: broken,
            },
            BulkEntry {
                name: "healthy".to_owned(),
                request: request(flat(1, 2)),
            },
        ];
        let (_shutdown_tx, shutdown_rx) = shutdown_channel();
        let results = run_bulk(entries.clone(), |_| Arc::clone(&factory), shutdown_rx).await;
        let kinds: Vec<(bool, bool)> = results
            .iter()
            .map(|result| {
                (
                    result.skipped,
                    result.outcome.as_ref().is_some_and(|outcome| outcome.report().is_some()),
                )
            })
            .collect();
        if kinds != vec![(false, false), (false, true)] {
            return Err(AppError::validation(format!("Unexpected bulk results: {:?}", kinds)));
        }

        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        request_shutdown(&shutdown_tx);
        let results = run_bulk(entries, |_| Arc::clone(&factory), shutdown_rx).await;
        if !results
            .iter()
            .all(|result| result.skipped && result.outcome.is_none())
        {
            return Err(AppError::validation("Every entry should be skipped"));
        }
        Ok(())
    })
}
