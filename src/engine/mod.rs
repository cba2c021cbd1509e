//! Run orchestration: resolve, schedule, aggregate, assert.
mod bulk;
mod handle;
mod run;

#[cfg(test)]
mod tests;

pub use bulk::{BulkEntry, BulkEntryResult, run_bulk};
pub use handle::{RunHandle, spawn_run, spawn_run_with};
pub use run::{RunOutcome, RunReport, RunRequest, run_load_test};
