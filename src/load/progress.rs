use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::profile::PhaseKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    /// Flat profiles have no phases.
    Running,
    Warmup,
    RampUp,
    Sustain,
    RampDown,
    Completed,
    Aborted,
}

impl RunState {
    #[must_use]
    pub const fn from_phase(phase: PhaseKind) -> Self {
        match phase {
            PhaseKind::Warmup => RunState::Warmup,
            PhaseKind::RampUp => RunState::RampUp,
            PhaseKind::Sustain => RunState::Sustain,
            PhaseKind::RampDown => RunState::RampDown,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Warmup => "warmup",
            RunState::RampUp => "rampup",
            RunState::Sustain => "sustain",
            RunState::RampDown => "rampdown",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    pub state: RunState,
    pub completed_count: u64,
    pub total_estimate: u64,
    #[serde(rename = "activeVUs")]
    pub active_vus: u32,
    pub elapsed_ms: u64,
}

pub type ProgressReceiver = watch::Receiver<RunProgress>;

/// Publishes progress snapshots. `completed_count` never goes backwards.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: watch::Sender<RunProgress>,
}

impl ProgressReporter {
    #[must_use]
    pub fn new() -> (Self, ProgressReceiver) {
        let (tx, rx) = watch::channel(RunProgress::default());
        (Self { tx }, rx)
    }

    pub fn publish(&self, progress: RunProgress) {
        self.tx.send_modify(|current| {
            let completed_count = current.completed_count.max(progress.completed_count);
            *current = RunProgress {
                completed_count,
                total_estimate: progress.total_estimate.max(completed_count),
                ..progress
            };
        });
    }

    pub fn set_state(&self, state: RunState) {
        self.tx.send_modify(|current| current.state = state);
    }

    #[must_use]
    pub fn subscribe(&self) -> ProgressReceiver {
        self.tx.subscribe()
    }
}

/// Estimated total for a phased run: completed work scaled by how much of
/// the planned duration has elapsed.
#[must_use]
pub fn estimate_phased_total(completed: u64, elapsed_ms: u64, planned_ms: u64) -> u64 {
    if elapsed_ms == 0 {
        return completed;
    }
    let scaled = u128::from(completed)
        .saturating_mul(u128::from(planned_ms))
        .checked_div(u128::from(elapsed_ms))
        .unwrap_or(0);
    u64::try_from(scaled).unwrap_or(u64::MAX).max(completed)
}
