use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::args::{CompareArgs, OutputFormat};
use crate::engine::{RunOutcome, RunReport};
use crate::error::{AppError, AppResult, ReportError};

use super::summary::{print_json, print_lines};

/// Which way a metric has to move to count as worse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Worse {
    Higher,
    Lower,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetricDelta {
    pub(crate) metric: &'static str,
    pub(crate) baseline: f64,
    pub(crate) candidate: f64,
    /// `None` when the baseline is zero and the candidate is not.
    pub(crate) change_percent: Option<f64>,
    pub(crate) worse_when: Worse,
    pub(crate) regression: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Comparison {
    pub(crate) threshold_percent: f64,
    pub(crate) metrics: Vec<MetricDelta>,
    pub(crate) regressions: usize,
}

pub(crate) async fn run_compare(args: &CompareArgs) -> AppResult<()> {
    let baseline = read_report(Path::new(&args.baseline)).await?;
    let candidate = read_report(Path::new(&args.candidate)).await?;
    let comparison = compare_reports(&baseline, &candidate, args.threshold);

    match args.output_format {
        OutputFormat::Json => print_json(&comparison)?,
        OutputFormat::Text => print_lines(&comparison_lines(&comparison)),
    }

    if comparison.regressions > 0 {
        warn!("{} metric(s) regressed", comparison.regressions);
        return Err(AppError::report(ReportError::RegressionsDetected {
            count: comparison.regressions,
        }));
    }
    Ok(())
}

/// Reads a report written by `--export-json`.
pub(crate) async fn read_report(path: &Path) -> AppResult<RunReport> {
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        AppError::report(ReportError::ReadReport {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    let outcome: RunOutcome = serde_json::from_slice(&bytes).map_err(|err| {
        AppError::report(ReportError::ParseReport {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    match outcome {
        RunOutcome::Completed(report) => Ok(*report),
        RunOutcome::Failed { .. } => Err(AppError::report(ReportError::ReportHasNoStats {
            path: path.to_path_buf(),
        })),
    }
}

pub(crate) fn compare_reports(
    baseline: &RunReport,
    candidate: &RunReport,
    threshold_percent: f64,
) -> Comparison {
    let base = &baseline.stats;
    let cand = &candidate.stats;
    let rows = [
        ("mean", base.mean, cand.mean, Worse::Higher),
        ("median", base.median, cand.median, Worse::Higher),
        ("p90", base.p90, cand.p90, Worse::Higher),
        ("p95", base.p95, cand.p95, Worse::Higher),
        ("p99", base.p99, cand.p99, Worse::Higher),
        ("max", base.max, cand.max, Worse::Higher),
        ("errorRate", base.error_rate, cand.error_rate, Worse::Higher),
        ("meanTtfb", base.mean_ttfb, cand.mean_ttfb, Worse::Higher),
        ("rps", base.rps, cand.rps, Worse::Lower),
        (
            "cacheHitRate",
            base.cache_hit_rate,
            cand.cache_hit_rate,
            Worse::Lower,
        ),
    ];

    let metrics: Vec<MetricDelta> = rows
        .into_iter()
        .map(|(metric, baseline, candidate, worse_when)| {
            metric_delta(metric, baseline, candidate, worse_when, threshold_percent)
        })
        .collect();
    let regressions = metrics.iter().filter(|delta| delta.regression).count();
    Comparison {
        threshold_percent,
        metrics,
        regressions,
    }
}

fn metric_delta(
    metric: &'static str,
    baseline: f64,
    candidate: f64,
    worse_when: Worse,
    threshold_percent: f64,
) -> MetricDelta {
    let change_percent = if baseline == 0.0 {
        (candidate == 0.0).then_some(0.0)
    } else {
        Some((candidate - baseline) / baseline * 100.0)
    };
    let regression = match (change_percent, worse_when) {
        (Some(change), Worse::Higher) => change > threshold_percent,
        (Some(change), Worse::Lower) => -change > threshold_percent,
        // From zero to anything is only worse when higher is worse.
        (None, Worse::Higher) => true,
        (None, Worse::Lower) => false,
    };
    MetricDelta {
        metric,
        baseline,
        candidate,
        change_percent,
        worse_when,
        regression,
    }
}

pub(crate) fn comparison_lines(comparison: &Comparison) -> Vec<String> {
    let mut lines = Vec::with_capacity(comparison.metrics.len().saturating_add(2));
    lines.push(format!(
        "Comparison (regression threshold {:.1}%):",
        comparison.threshold_percent
    ));
    for delta in &comparison.metrics {
        let change = delta
            .change_percent
            .map_or_else(|| "new".to_owned(), |change| format!("{change:+.1}%"));
        lines.push(format!(
            "  {:<14} {:>12.3} -> {:>12.3}  {:>8}{}",
            delta.metric,
            delta.baseline,
            delta.candidate,
            change,
            if delta.regression { "  REGRESSION" } else { "" }
        ));
    }
    lines.push(format!("Regressions: {}", comparison.regressions));
    lines
}
