use serde_json::Value;

use super::json_path::{lookup, value_to_text};
use super::types::{AssertionKind, AssertionOperator, AssertionResult, AssertionRule};
use crate::http::ResponseCapture;

/// Text shown for a value that could not be found.
pub const UNDEFINED: &str = "undefined";

/// What the rules are checked against: the representative response plus
/// the run's mean total time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssertionContext {
    pub status: u16,
    pub body_json: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub mean_response_time: f64,
}

impl AssertionContext {
    #[must_use]
    pub fn from_response(response: Option<&ResponseCapture>, mean_response_time: f64) -> Self {
        let Some(response) = response else {
            return Self {
                mean_response_time,
                ..Self::default()
            };
        };
        Self {
            status: response.status,
            body_json: serde_json::from_str(&response.body).ok(),
            headers: response.headers.clone(),
            mean_response_time,
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name.trim()))
            .map(|(_, value)| value.as_str())
    }
}

enum Actual {
    Found { text: String, number: Option<f64> },
    Missing { reason: String },
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn resolve_actual(rule: &AssertionRule, context: &AssertionContext) -> Actual {
    let field = rule.field_path.as_deref().unwrap_or_default();
    match rule.kind {
        AssertionKind::StatusCode => Actual::Found {
            text: context.status.to_string(),
            number: Some(f64::from(context.status)),
        },
        AssertionKind::ResponseTime => Actual::Found {
            text: format!("{:.2}", context.mean_response_time),
            number: Some(context.mean_response_time),
        },
        AssertionKind::JsonPath => {
            let Some(body) = context.body_json.as_ref() else {
                return Actual::Missing {
                    reason: "response body is not valid JSON".to_owned(),
                };
            };
            match lookup(body, field) {
                Some(value) => {
                    let number = match value {
                        Value::Number(number) => number.as_f64(),
                        Value::String(text) => parse_number(text),
                        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
                    };
                    Actual::Found {
                        text: value_to_text(value),
                        number,
                    }
                }
                None => Actual::Missing {
                    reason: format!("path '{}' not found in response body", field),
                },
            }
        }
        AssertionKind::Header => match context.header(field) {
            Some(value) => Actual::Found {
                text: value.to_owned(),
                number: parse_number(value),
            },
            None => Actual::Missing {
                reason: format!("header '{}' not present", field),
            },
        },
    }
}

fn target_label(rule: &AssertionRule) -> String {
    match rule.field_path.as_deref() {
        Some(field) if rule.kind.needs_field() => format!("{} {}", rule.kind, field),
        Some(_) | None => rule.kind.as_str().to_owned(),
    }
}

/// Applies one operator. `Err` carries the reason a comparison could not be
/// made at all.
fn compare(
    operator: AssertionOperator,
    text: &str,
    number: Option<f64>,
    expected: &str,
) -> Result<bool, String> {
    let expected_number = parse_number(expected);
    match operator {
        AssertionOperator::Exists => Ok(true),
        AssertionOperator::NotExists => Ok(false),
        AssertionOperator::Equals | AssertionOperator::Neq => {
            let equal = match (number, expected_number) {
                (Some(actual), Some(expected)) => actual.total_cmp(&expected).is_eq(),
                (Some(_) | None, Some(_) | None) => text == expected,
            };
            Ok(if operator == AssertionOperator::Equals {
                equal
            } else {
                !equal
            })
        }
        AssertionOperator::Contains => Ok(text.contains(expected)),
        AssertionOperator::Gt
        | AssertionOperator::Lt
        | AssertionOperator::Gte
        | AssertionOperator::Lte => {
            let actual = number.ok_or_else(|| format!("actual value '{}' is not numeric", text))?;
            let expected = expected_number
                .ok_or_else(|| format!("expected value '{}' is not numeric", expected))?;
            Ok(match operator {
                AssertionOperator::Gt => actual > expected,
                AssertionOperator::Lt => actual < expected,
                AssertionOperator::Gte => actual >= expected,
                AssertionOperator::Lte => actual <= expected,
                AssertionOperator::Equals
                | AssertionOperator::Neq
                | AssertionOperator::Contains
                | AssertionOperator::Exists
                | AssertionOperator::NotExists => false,
            })
        }
    }
}

fn evaluate_rule(rule: &AssertionRule, context: &AssertionContext) -> AssertionResult {
    let label = target_label(rule);
    let expected = rule.expected_value.trim();
    let shown_expected = if rule.operator.takes_value() {
        format!(" {}", expected)
    } else {
        String::new()
    };
    let (actual, passed, message) = match resolve_actual(rule, context) {
        Actual::Missing { reason } => {
            let passed = rule.operator == AssertionOperator::NotExists;
            let message = if passed {
                format!("{} {}", label, rule.operator)
            } else {
                format!("{} {}{} failed: {}", label, rule.operator, shown_expected, reason)
            };
            (UNDEFINED.to_owned(), passed, message)
        }
        Actual::Found { text, number } => match compare(rule.operator, &text, number, expected) {
            Ok(true) => {
                let message = format!("{} {}{}", label, rule.operator, shown_expected);
                (text, true, message)
            }
            Ok(false) => {
                let message = format!(
                    "{} {}{} failed: actual {}",
                    label, rule.operator, shown_expected, text
                );
                (text, false, message)
            }
            Err(reason) => {
                let message = format!(
                    "{} {}{} failed: {}",
                    label, rule.operator, shown_expected, reason
                );
                (text, false, message)
            }
        },
    };

    AssertionResult {
        kind: rule.kind,
        operator: rule.operator,
        expected: expected.to_owned(),
        actual,
        passed,
        message,
    }
}

/// Evaluates every enabled rule in order. Disabled rules are left out of
/// the result list; no rule can make evaluation itself fail.
#[must_use]
pub fn evaluate(rules: &[AssertionRule], context: &AssertionContext) -> Vec<AssertionResult> {
    rules
        .iter()
        .filter(|rule| rule.enabled)
        .map(|rule| evaluate_rule(rule, context))
        .collect()
}
