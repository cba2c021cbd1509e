//! Load profiles, the phased timeline, and the virtual-user scheduler.
mod plan;
mod profile;
mod progress;
mod scheduler;


pub use plan::{PhasePlan, PlannedPhase};
pub use profile::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_WARMUP_VUS_PERCENT, LoadProfile, MAX_ITERATIONS, PhaseKind,
    PhaseSpec, PhasedProfile,
};
pub use progress::{
    ProgressReceiver, ProgressReporter, RunProgress, RunState, estimate_phased_total,
};
pub use scheduler::{ScheduleOutcome, Scheduler};
