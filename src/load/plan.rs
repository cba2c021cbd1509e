use std::time::Duration;

use super::profile::{PhaseKind, PhasedProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedPhase {
    pub kind: PhaseKind,
    pub start: Duration,
    pub duration: Duration,
    pub start_vus: u32,
    pub end_vus: u32,
}

impl PlannedPhase {
    #[must_use]
    pub fn end(&self) -> Duration {
        self.start.saturating_add(self.duration)
    }

    fn vus_at(&self, elapsed_in_phase: Duration) -> u32 {
        let phase_ms = self.duration.as_millis().max(1);
        let elapsed_ms = elapsed_in_phase.as_millis().min(phase_ms);

        let start = i128::from(self.start_vus);
        let target = i128::from(self.end_vus);
        let delta = target.saturating_sub(start);
        let step = delta
            .saturating_mul(i128::try_from(elapsed_ms).unwrap_or(i128::MAX))
            .checked_div(i128::try_from(phase_ms).unwrap_or(1))
            .unwrap_or(0);
        let vus = start.saturating_add(step);
        if vus < 0 {
            0
        } else {
            u32::try_from(vus).unwrap_or(u32::MAX)
        }
    }
}

/// Wall-clock timeline of a phased run.
///
/// Warmup and sustain hold their targets. Ramp-up and ramp-down start at
/// the previous phase's ending VU count and move linearly to their own
/// target over the phase duration. Zero-length phases are skipped but still
/// hand their target on to the next phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    phases: Vec<PlannedPhase>,
    total: Duration,
}

impl PhasePlan {
    #[must_use]
    pub fn new(profile: &PhasedProfile) -> Self {
        let mut phases = Vec::with_capacity(PhaseKind::ALL.len());
        let mut start = Duration::ZERO;
        let mut previous_end_vus = profile.warmup.target_vus;

        for kind in PhaseKind::ALL {
            let spec = profile.phase(kind);
            let start_vus = match kind {
                PhaseKind::RampUp | PhaseKind::RampDown => previous_end_vus,
                PhaseKind::Warmup | PhaseKind::Sustain => spec.target_vus,
            };
            previous_end_vus = spec.target_vus;
            if spec.duration.is_zero() {
                continue;
            }
            phases.push(PlannedPhase {
                kind,
                start,
                duration: spec.duration,
                start_vus,
                end_vus: spec.target_vus,
            });
            start = start.saturating_add(spec.duration);
        }

        Self {
            phases,
            total: start,
        }
    }

    #[must_use]
    pub const fn total_duration(&self) -> Duration {
        self.total
    }

    #[must_use]
    pub fn phases(&self) -> &[PlannedPhase] {
        &self.phases
    }

    fn phase_entry(&self, elapsed: Duration) -> Option<&PlannedPhase> {
        self.phases
            .iter()
            .find(|phase| elapsed >= phase.start && elapsed < phase.end())
    }

    /// Active phase at `elapsed`; `None` once the plan is over.
    #[must_use]
    pub fn phase_at(&self, elapsed: Duration) -> Option<PhaseKind> {
        self.phase_entry(elapsed).map(|phase| phase.kind)
    }

    /// Target lane count at `elapsed`; zero once the plan is over.
    #[must_use]
    pub fn vus_at(&self, elapsed: Duration) -> u32 {
        self.phase_entry(elapsed).map_or(0, |phase| {
            phase.vus_at(elapsed.saturating_sub(phase.start))
        })
    }

    #[must_use]
    pub fn peak_vus(&self) -> u32 {
        self.phases
            .iter()
            .map(|phase| phase.start_vus.max(phase.end_vus))
            .max()
            .unwrap_or(0)
    }
}
