use std::time::Duration;

use crate::error::{AppError, AppResult, ConfigError};
use crate::load::{DEFAULT_WARMUP_VUS_PERCENT, LoadProfile, PhaseSpec, PhasedProfile};

use super::super::types::{LoadConfig, PhaseConfig, PhasedConfig};
use super::util::{ensure_positive_u64, ensure_positive_usize, phase_duration_field};

const PHASE_FIELDS: [&str; 4] = [
    "load.warmup",
    "load.ramp_up",
    "load.sustain",
    "load.ramp_down",
];

/// Load values given explicitly on the command line. Each one beats the
/// config file.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct LoadOverrides {
    pub(super) concurrency: Option<usize>,
    pub(super) iterations: Option<u64>,
    pub(super) max_vus: Option<u32>,
    pub(super) warmup_vus_percent: Option<u32>,
    /// warmup, ramp-up, sustain, ramp-down
    pub(super) durations: [Option<Duration>; 4],
}

pub(super) fn resolve_profile(load: &LoadConfig, cli: &LoadOverrides) -> AppResult<LoadProfile> {
    let cli_flat = cli.concurrency.is_some() || cli.iterations.is_some();
    let cli_phased = cli.max_vus.is_some();
    if cli_flat && cli_phased {
        return Err(AppError::config(ConfigError::Conflict {
            left: "--concurrency/--iterations",
            right: "--max-vus",
        }));
    }
    if load.phased.is_some() && load.max_vus.is_some() {
        return Err(AppError::config(ConfigError::Conflict {
            left: "load.phased",
            right: "load.max_vus",
        }));
    }
    let config_flat = load.concurrency.is_some() || load.iterations.is_some();
    let config_phased = load.phased.is_some() || load.max_vus.is_some();
    if config_flat && config_phased {
        return Err(AppError::config(ConfigError::Conflict {
            left: "load.concurrency/load.iterations",
            right: "load.max_vus/load.phased",
        }));
    }

    if cli_phased || (!cli_flat && config_phased) {
        if !cli_phased && let Some(phased) = load.phased.as_ref() {
            return explicit_phases(phased);
        }
        return peak_phases(load, cli);
    }

    let concurrency = ensure_positive_usize(
        cli.concurrency.or(load.concurrency).unwrap_or(1),
        "load.concurrency",
    )?;
    let iterations = ensure_positive_u64(
        cli.iterations.or(load.iterations).unwrap_or(1),
        "load.iterations",
    )?;
    Ok(LoadProfile::Flat {
        concurrency: concurrency.get(),
        iterations: iterations.get(),
    })
}

fn peak_phases(load: &LoadConfig, cli: &LoadOverrides) -> AppResult<LoadProfile> {
    let max_vus = cli.max_vus.or(load.max_vus).unwrap_or(0);
    let percent = cli
        .warmup_vus_percent
        .or(load.warmup_vus_percent)
        .unwrap_or(DEFAULT_WARMUP_VUS_PERCENT);
    let configured = [&load.warmup, &load.ramp_up, &load.sustain, &load.ramp_down];

    let mut durations = [Duration::ZERO; 4];
    for (((slot, cli_value), config_value), field) in durations
        .iter_mut()
        .zip(cli.durations)
        .zip(configured)
        .zip(PHASE_FIELDS)
    {
        *slot = match (cli_value, config_value) {
            (Some(duration), _) => duration,
            (None, Some(value)) => phase_duration_field(value, field)?,
            (None, None) => Duration::ZERO,
        };
    }

    Ok(LoadProfile::Phased(PhasedProfile::from_peak(
        max_vus, percent, durations,
    )?))
}

fn explicit_phases(phased: &PhasedConfig) -> AppResult<LoadProfile> {
    let [warmup, ramp_up, sustain, ramp_down] = PHASE_FIELDS;
    Ok(LoadProfile::Phased(PhasedProfile {
        warmup: phase_spec(phased.warmup.as_ref(), warmup)?,
        ramp_up: phase_spec(phased.ramp_up.as_ref(), ramp_up)?,
        sustain: phase_spec(phased.sustain.as_ref(), sustain)?,
        ramp_down: phase_spec(phased.ramp_down.as_ref(), ramp_down)?,
    }))
}

fn phase_spec(phase: Option<&PhaseConfig>, field: &str) -> AppResult<PhaseSpec> {
    let Some(phase) = phase else {
        return Ok(PhaseSpec::default());
    };
    let duration = phase_duration_field(&phase.duration, field)?;
    Ok(PhaseSpec::new(duration, phase.vus))
}
