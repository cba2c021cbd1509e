use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::plan::PhasePlan;
use crate::error::ConfigError;

/// Advertised upper bound on concurrent virtual users.
pub const DEFAULT_MAX_CONCURRENCY: usize = 100;
/// Advertised upper bound on iterations per virtual user.
pub const MAX_ITERATIONS: u64 = 1000;
/// Warmup holds this share of the peak when only `max_vus` is given.
pub const DEFAULT_WARMUP_VUS_PERCENT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Warmup,
    RampUp,
    Sustain,
    RampDown,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 4] = [
        PhaseKind::Warmup,
        PhaseKind::RampUp,
        PhaseKind::Sustain,
        PhaseKind::RampDown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Warmup => "warmup",
            PhaseKind::RampUp => "rampup",
            PhaseKind::Sustain => "sustain",
            PhaseKind::RampDown => "rampdown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSpec {
    pub duration: Duration,
    pub target_vus: u32,
}

impl PhaseSpec {
    #[must_use]
    pub const fn new(duration: Duration, target_vus: u32) -> Self {
        Self {
            duration,
            target_vus,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhasedProfile {
    pub warmup: PhaseSpec,
    pub ramp_up: PhaseSpec,
    pub sustain: PhaseSpec,
    pub ramp_down: PhaseSpec,
}

impl PhasedProfile {
    /// Derives per-phase targets from a peak: warmup holds
    /// `warmup_percent`% of `max_vus`, ramp-up climbs to the peak, sustain
    /// holds it, and ramp-down returns to zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWarmupPercent`] when `warmup_percent`
    /// is above 100.
    pub fn from_peak(
        max_vus: u32,
        warmup_percent: u32,
        durations: [Duration; 4],
    ) -> Result<Self, ConfigError> {
        if warmup_percent > 100 {
            return Err(ConfigError::InvalidWarmupPercent {
                value: warmup_percent,
            });
        }
        let warmup_vus = u32::try_from(
            u64::from(max_vus)
                .saturating_mul(u64::from(warmup_percent))
                .checked_div(100)
                .unwrap_or(0),
        )
        .unwrap_or(max_vus);
        let [warmup, ramp_up, sustain, ramp_down] = durations;
        Ok(Self {
            warmup: PhaseSpec::new(warmup, warmup_vus),
            ramp_up: PhaseSpec::new(ramp_up, max_vus),
            sustain: PhaseSpec::new(sustain, max_vus),
            ramp_down: PhaseSpec::new(ramp_down, 0),
        })
    }

    #[must_use]
    pub const fn phase(&self, kind: PhaseKind) -> PhaseSpec {
        match kind {
            PhaseKind::Warmup => self.warmup,
            PhaseKind::RampUp => self.ramp_up,
            PhaseKind::Sustain => self.sustain,
            PhaseKind::RampDown => self.ramp_down,
        }
    }

    #[must_use]
    pub fn total_duration(&self) -> Duration {
        PhaseKind::ALL
            .iter()
            .fold(Duration::ZERO, |total, kind| {
                total.saturating_add(self.phase(*kind).duration)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadProfile {
    Flat { concurrency: usize, iterations: u64 },
    Phased(PhasedProfile),
}

impl LoadProfile {
    /// Checks the profile against the concurrency cap and iteration bound.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a flat profile has zero or too many
    /// lanes or iterations, a phase target exceeds `max_concurrency`, or a
    /// phased profile has no duration at all.
    pub fn validate(&self, max_concurrency: usize) -> Result<(), ConfigError> {
        match self {
            LoadProfile::Flat {
                concurrency,
                iterations,
            } => {
                if *concurrency == 0 || *concurrency > max_concurrency {
                    return Err(ConfigError::ConcurrencyOutOfRange {
                        value: *concurrency,
                        max: max_concurrency,
                    });
                }
                if *iterations == 0 || *iterations > MAX_ITERATIONS {
                    return Err(ConfigError::IterationsOutOfRange {
                        value: *iterations,
                        max: MAX_ITERATIONS,
                    });
                }
                Ok(())
            }
            LoadProfile::Phased(phased) => {
                for kind in PhaseKind::ALL {
                    let spec = phased.phase(kind);
                    let over_cap = usize::try_from(spec.target_vus)
                        .map_or(true, |vus| vus > max_concurrency);
                    if over_cap {
                        return Err(ConfigError::PhaseVusOutOfRange {
                            phase: kind.as_str(),
                            value: spec.target_vus,
                            max: max_concurrency,
                        });
                    }
                }
                if phased.total_duration().is_zero() {
                    return Err(ConfigError::PhasedProfileEmpty);
                }
                Ok(())
            }
        }
    }

    /// Lanes that may exist at once; also the size of the "first wave"
    /// excluded from the warm average.
    #[must_use]
    pub fn peak_lanes(&self) -> usize {
        match self {
            LoadProfile::Flat { concurrency, .. } => *concurrency,
            LoadProfile::Phased(phased) => {
                let peak = PhasePlan::new(phased).peak_vus();
                usize::try_from(peak).unwrap_or(usize::MAX)
            }
        }
    }

    /// Exact request count for flat profiles.
    #[must_use]
    pub fn planned_requests(&self) -> Option<u64> {
        match self {
            LoadProfile::Flat {
                concurrency,
                iterations,
            } => Some(
                u64::try_from(*concurrency)
                    .unwrap_or(u64::MAX)
                    .saturating_mul(*iterations),
            ),
            LoadProfile::Phased(_) => None,
        }
    }
}
