use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::run::{RunOutcome, RunRequest, run_load_test};
use crate::http::ExecutorFactory;
use crate::load::ProgressReporter;
use crate::shutdown::{ShutdownReceiver, is_shutdown};

#[derive(Debug, Clone, PartialEq)]
pub struct BulkEntry {
    pub name: String,
    pub request: RunRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEntryResult {
    pub name: String,
    /// Set when cancellation arrived before this entry started.
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
}

/// Runs each entry in order. A configuration error fails only its own
/// entry; cancellation finishes the current entry with a partial report and
/// skips the rest.
pub async fn run_bulk<F>(
    entries: Vec<BulkEntry>,
    executors_for: F,
    shutdown_rx: ShutdownReceiver,
) -> Vec<BulkEntryResult>
where
    F: Fn(&RunRequest) -> Arc<dyn ExecutorFactory>,
{
    let total = entries.len();
    let mut results = Vec::with_capacity(total);
    for (position, entry) in entries.into_iter().enumerate() {
        if is_shutdown(&shutdown_rx) {
            results.push(BulkEntryResult {
                name: entry.name,
                skipped: true,
                outcome: None,
            });
            continue;
        }
        info!(
            "Bulk run {}/{}: {}",
            position.saturating_add(1),
            total,
            entry.name
        );
        let executors = executors_for(&entry.request);
        let (progress, _progress_rx) = ProgressReporter::new();
        let result = run_load_test(
            entry.request,
            executors.as_ref(),
            shutdown_rx.clone(),
            progress,
        )
        .await;
        if let Err(err) = &result {
            warn!("Bulk run '{}' failed: {}", entry.name, err);
        }
        results.push(BulkEntryResult {
            name: entry.name,
            skipped: false,
            outcome: Some(RunOutcome::from_result(result)),
        });
    }
    results
}
