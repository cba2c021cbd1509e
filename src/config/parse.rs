use std::time::Duration;

use crate::args::parse_duration_text;
use crate::error::ValidationError;

/// Durations in config files share the CLI syntax.
pub(crate) fn parse_duration_value(
    value: &str,
    allow_zero: bool,
) -> Result<Duration, ValidationError> {
    parse_duration_text(value, allow_zero)
}
