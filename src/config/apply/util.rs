use std::time::Duration;

use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{PositiveU64, PositiveUsize, parse_header, parse_key_value};
use crate::assertions::AssertionRule;
use crate::error::{AppError, AppResult, ConfigError};

use super::super::types::DurationValue;

pub(super) fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

pub(super) fn ensure_positive_u64(value: u64, field: &str) -> AppResult<PositiveU64> {
    PositiveU64::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

pub(super) fn ensure_positive_usize(value: usize, field: &str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

pub(super) fn parse_headers(headers: &[String]) -> AppResult<Vec<(String, String)>> {
    let mut parsed = Vec::with_capacity(headers.len());
    for header in headers {
        parsed.push(
            parse_header(header)
                .map_err(|err| AppError::config(ConfigError::InvalidHeader { source: err }))?,
        );
    }
    Ok(parsed)
}

pub(super) fn parse_query(entries: &[String]) -> AppResult<Vec<(String, String)>> {
    let mut parsed = Vec::with_capacity(entries.len());
    for entry in entries {
        parsed.push(
            parse_key_value(entry)
                .map_err(|err| AppError::config(ConfigError::InvalidQuery { source: err }))?,
        );
    }
    Ok(parsed)
}

pub(super) fn duration_field(value: &DurationValue, field: &str) -> AppResult<Duration> {
    value.to_duration().map_err(|err| {
        AppError::config(ConfigError::InvalidDuration {
            field: field.to_owned(),
            source: err,
        })
    })
}

pub(super) fn phase_duration_field(value: &DurationValue, field: &str) -> AppResult<Duration> {
    value.to_phase_duration().map_err(|err| {
        AppError::config(ConfigError::InvalidDuration {
            field: field.to_owned(),
            source: err,
        })
    })
}

pub(super) fn validate_assertions(rules: &[AssertionRule]) -> AppResult<()> {
    for (index, rule) in rules.iter().enumerate() {
        rule.validate().map_err(|err| {
            AppError::config(ConfigError::InvalidAssertion {
                index: index.saturating_add(1),
                source: err,
            })
        })?;
    }
    Ok(())
}
