use std::fmt::Write as _;

use crate::chain::{ChainResult, StepStatus};
use crate::engine::{BulkEntryResult, RunOutcome, RunReport};
use crate::error::{AppError, AppResult, ReportError};
use crate::metrics::PhaseTimings;

/// Human-readable summary of one run.
pub(crate) fn summary_lines(report: &RunReport) -> AppResult<Vec<String>> {
    let stats = &report.stats;
    let mut lines = Vec::new();

    lines.push(format!(
        "Result: {} ({})",
        if report.success { "PASS" } else { "FAIL" },
        report.state.as_str()
    ));
    lines.push(format!("Duration: {:.2}s", stats.elapsed_ms / 1000.0));
    lines.push(format!("Total Requests: {}", stats.requests));
    lines.push(format!("Successful: {}", stats.success_count));
    lines.push(format!(
        "Errors: {} ({:.2}%), timeouts: {}",
        stats.error_count, stats.error_rate, stats.timeout_count
    ));
    lines.push(format!("Throughput: {:.2} req/s", stats.rps));
    lines.push(format!(
        "Response Time: mean {:.2}ms, median {:.2}ms, min {:.2}ms, max {:.2}ms, stddev {:.2}ms",
        stats.mean, stats.median, stats.min, stats.max, stats.stddev
    ));
    lines.push(format!(
        "Percentiles: p50 {:.2}ms, p75 {:.2}ms, p90 {:.2}ms, p95 {:.2}ms, p99 {:.2}ms",
        stats.p50, stats.p75, stats.p90, stats.p95, stats.p99
    ));
    if stats.percentile_samples < stats.requests {
        lines.push(format!(
            "  (percentiles over the first {} of {} requests)",
            stats.percentile_samples, stats.requests
        ));
    }
    lines.push(format!("Mean TTFB: {:.2}ms", stats.mean_ttfb));
    lines.push(format!("Bytes Received: {}", stats.total_bytes));
    lines.push(format!(
        "Cache: {} hit / {} miss ({:.1}% hit)",
        stats.cache_hits,
        stats.cache_misses,
        stats.cache_hit_rate * 100.0
    ));
    lines.push(format!(
        "Cold/Warm: cold {:.2}ms, warm avg {:.2}ms, ratio {:.2}",
        report.testing.cold_start, report.testing.warm_avg, report.testing.cold_warm_ratio
    ));
    lines.extend(bottleneck_lines(&report.bottleneck)?);

    if !stats.status_codes.is_empty() {
        let mut codes = String::from("Status Codes:");
        for (status, count) in &stats.status_codes {
            let label = if *status == 0 {
                "network".to_owned()
            } else {
                status.to_string()
            };
            write!(codes, " {label}={count}")
                .map_err(|err| AppError::report(ReportError::WriteLine { source: err }))?;
        }
        lines.push(codes);
    }

    if !report.assertions.is_empty() {
        lines.push(format!(
            "Assertions: {}/{} passed",
            report.assertions_passed, report.assertions_total
        ));
        for result in &report.assertions {
            lines.push(format!(
                "  [{}] {} {} {:?} (actual {:?}){}",
                if result.passed { "PASS" } else { "FAIL" },
                result.kind,
                result.operator,
                result.expected,
                result.actual,
                if result.passed {
                    String::new()
                } else {
                    format!(": {}", result.message)
                }
            ));
        }
    }
    Ok(lines)
}

/// The transport reports no connect or handshake events.
const CONNECT_IN_WAIT_NOTE: &str =
    "  note: tcp/tls are not timed separately; connection setup is included in wait";

fn bottleneck_lines(bottleneck: &PhaseTimings) -> AppResult<Vec<String>> {
    let total = bottleneck.total();
    let mut line = String::from("Bottleneck:");
    for (name, value) in [
        ("dns", bottleneck.dns),
        ("tcp", bottleneck.tcp),
        ("tls", bottleneck.tls),
        ("wait", bottleneck.wait),
        ("download", bottleneck.download),
    ] {
        let share = if total > 0.0 { value / total * 100.0 } else { 0.0 };
        write!(line, " {name} {value:.1}ms ({share:.0}%)")
            .map_err(|err| AppError::report(ReportError::WriteLine { source: err }))?;
    }
    let mut lines = vec![line];
    if let Some(dominant) = bottleneck.dominant() {
        lines.push(format!("  dominant phase: {dominant}"));
    }
    if bottleneck.tcp == 0.0 && bottleneck.tls == 0.0 && bottleneck.wait > 0.0 {
        lines.push(CONNECT_IN_WAIT_NOTE.to_owned());
    }
    Ok(lines)
}

pub(crate) fn chain_lines(result: &ChainResult) -> AppResult<Vec<String>> {
    let mut lines = Vec::with_capacity(result.steps.len().saturating_add(2));
    let verdict = if result.cancelled {
        "CANCELLED"
    } else if result.success {
        "PASS"
    } else {
        "FAIL"
    };
    lines.push(format!("Chain: {} in {:.2}ms", verdict, result.total_duration_ms));
    for step in &result.steps {
        let status = match step.status {
            StepStatus::Passed => "PASS",
            StepStatus::Failed => "FAIL",
            StepStatus::Skipped => "SKIP",
        };
        let mut line = format!("  [{status}] {} ({})", step.name, step.id);
        if let Some(http_status) = step.http_status {
            write!(line, " status {http_status}, {:.2}ms", step.duration_ms)
                .map_err(|err| AppError::report(ReportError::WriteLine { source: err }))?;
        }
        if let Some(error) = step.error.as_deref() {
            write!(line, ": {error}")
                .map_err(|err| AppError::report(ReportError::WriteLine { source: err }))?;
        }
        lines.push(line);
        for (name, value) in &step.extracted {
            lines.push(format!("      {name} = {value}"));
        }
        for name in &step.missing_extractions {
            lines.push(format!("      {name} not found"));
        }
    }
    Ok(lines)
}

pub(crate) fn bulk_lines(results: &[BulkEntryResult]) -> Vec<String> {
    let mut lines = Vec::with_capacity(results.len().saturating_add(1));
    lines.push(format!("Bulk: {} run(s)", results.len()));
    for entry in results {
        let line = match entry.outcome.as_ref() {
            None => format!("  [SKIP] {}", entry.name),
            Some(RunOutcome::Failed { error }) => format!("  [ERROR] {}: {}", entry.name, error),
            Some(RunOutcome::Completed(report)) => format!(
                "  [{}] {}: {} req, {:.2}% errors, mean {:.2}ms, p95 {:.2}ms, {:.2} req/s",
                if report.success { "PASS" } else { "FAIL" },
                entry.name,
                report.stats.requests,
                report.stats.error_rate,
                report.stats.mean,
                report.stats.p95,
                report.stats.rps
            ),
        };
        lines.push(line);
    }
    lines
}

pub(crate) fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

/// Prints `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::report(ReportError::Serialize { source: err }))?;
    println!("{json}");
    Ok(())
}
