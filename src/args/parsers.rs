use std::time::Duration;

use super::types::{PositiveU64, PositiveUsize};
use crate::assertions::{AssertionKind, AssertionOperator, AssertionRule};
use crate::error::{AppError, AppResult, ValidationError};

pub(crate) fn parse_header(s: &str) -> Result<(String, String), ValidationError> {
    match s.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.trim().to_owned()))
        }
        Some(_) | None => Err(ValidationError::InvalidHeaderFormat {
            value: s.to_owned(),
        }),
    }
}

/// `key=value`; the value may be empty or contain further `=`.
pub(crate) fn parse_key_value(s: &str) -> Result<(String, String), ValidationError> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.to_owned()))
        }
        Some(_) | None => Err(ValidationError::InvalidKeyValue {
            value: s.to_owned(),
        }),
    }
}

pub(crate) fn parse_credentials(s: &str) -> Result<(String, String), ValidationError> {
    match s.split_once(':') {
        Some((user, pass)) if !user.is_empty() => Ok((user.to_owned(), pass.to_owned())),
        Some(_) | None => Err(ValidationError::InvalidCredentials {
            value: s.to_owned(),
        }),
    }
}

pub(super) fn parse_positive_u64(s: &str) -> AppResult<PositiveU64> {
    s.parse::<PositiveU64>().map_err(AppError::from)
}

pub(super) fn parse_positive_usize(s: &str) -> AppResult<PositiveUsize> {
    s.parse::<PositiveUsize>().map_err(AppError::from)
}

/// Number with an optional `ms`/`s`/`m`/`h` suffix; a bare number is
/// seconds.
pub(crate) fn parse_duration_text(value: &str, allow_zero: bool) -> Result<Duration, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::DurationEmpty);
    }

    let digits_len = value
        .chars()
        .take_while(char::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return Err(ValidationError::InvalidDurationFormat {
            value: value.to_owned(),
        });
    }
    let (num_part, unit_part) = value.split_at(digits_len);
    let number: u64 = num_part
        .parse()
        .map_err(|err| ValidationError::InvalidDurationNumber {
            value: value.to_owned(),
            source: err,
        })?;

    let unit = if unit_part.is_empty() { "s" } else { unit_part };
    let duration = match unit {
        "ms" => Duration::from_millis(number),
        "s" => Duration::from_secs(number),
        "m" => {
            let secs = number
                .checked_mul(60)
                .ok_or(ValidationError::DurationOverflow)?;
            Duration::from_secs(secs)
        }
        "h" => {
            let secs = number
                .checked_mul(60)
                .and_then(|seconds| seconds.checked_mul(60))
                .ok_or(ValidationError::DurationOverflow)?;
            Duration::from_secs(secs)
        }
        _ => {
            return Err(ValidationError::InvalidDurationUnit {
                unit: unit.to_owned(),
            });
        }
    };

    if !allow_zero && duration.is_zero() {
        return Err(ValidationError::DurationZero);
    }

    Ok(duration)
}

pub(crate) fn parse_duration_arg(s: &str) -> AppResult<Duration> {
    parse_duration_text(s, false).map_err(AppError::validation)
}

/// Phase lengths may be zero to skip a phase.
pub(crate) fn parse_phase_duration(s: &str) -> AppResult<Duration> {
    parse_duration_text(s, true).map_err(AppError::validation)
}

/// `type[:field] operator [expected]`, for example `status_code equals 200`,
/// `json_path:$.data.id exists` or `header:X-Cache contains HIT`.
pub(crate) fn parse_assertion(s: &str) -> Result<AssertionRule, ValidationError> {
    let mut parts = s.split_whitespace();
    let target = parts.next().ok_or_else(|| ValidationError::InvalidAssertion {
        value: s.to_owned(),
        reason: "expected 'type[:field] operator [expected]'",
    })?;
    let operator = parts.next().ok_or_else(|| ValidationError::InvalidAssertion {
        value: s.to_owned(),
        reason: "missing operator",
    })?;
    let expected = parts.collect::<Vec<_>>().join(" ");

    let (kind, field) = match target.split_once(':') {
        Some((kind, field)) => (kind, Some(field)),
        None => (target, None),
    };
    let kind: AssertionKind = kind.parse()?;
    let operator: AssertionOperator = operator.parse()?;

    let rule = AssertionRule::new(kind, operator, &expected);
    let rule = match field {
        Some(field) if !field.is_empty() => rule.with_field(field),
        Some(_) | None => rule,
    };
    rule.validate()?;
    Ok(rule)
}
