use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    StatusCode,
    ResponseTime,
    JsonPath,
    Header,
}

impl AssertionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AssertionKind::StatusCode => "status_code",
            AssertionKind::ResponseTime => "response_time",
            AssertionKind::JsonPath => "json_path",
            AssertionKind::Header => "header",
        }
    }

    #[must_use]
    pub const fn needs_field(self) -> bool {
        matches!(self, AssertionKind::JsonPath | AssertionKind::Header)
    }
}

impl FromStr for AssertionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "status_code" | "status" => Ok(AssertionKind::StatusCode),
            "response_time" | "latency" => Ok(AssertionKind::ResponseTime),
            "json_path" | "json" => Ok(AssertionKind::JsonPath),
            "header" => Ok(AssertionKind::Header),
            _ => Err(ValidationError::UnknownAssertionType {
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionOperator {
    Equals,
    Neq,
    Contains,
    Gt,
    Lt,
    Gte,
    Lte,
    Exists,
    NotExists,
}

impl AssertionOperator {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AssertionOperator::Equals => "equals",
            AssertionOperator::Neq => "neq",
            AssertionOperator::Contains => "contains",
            AssertionOperator::Gt => "gt",
            AssertionOperator::Lt => "lt",
            AssertionOperator::Gte => "gte",
            AssertionOperator::Lte => "lte",
            AssertionOperator::Exists => "exists",
            AssertionOperator::NotExists => "not_exists",
        }
    }

    #[must_use]
    pub const fn takes_value(self) -> bool {
        !matches!(self, AssertionOperator::Exists | AssertionOperator::NotExists)
    }
}

impl FromStr for AssertionOperator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equals" | "eq" | "==" | "=" => Ok(AssertionOperator::Equals),
            "neq" | "ne" | "!=" => Ok(AssertionOperator::Neq),
            "contains" => Ok(AssertionOperator::Contains),
            "gt" | ">" => Ok(AssertionOperator::Gt),
            "lt" | "<" => Ok(AssertionOperator::Lt),
            "gte" | ">=" => Ok(AssertionOperator::Gte),
            "lte" | "<=" => Ok(AssertionOperator::Lte),
            "exists" => Ok(AssertionOperator::Exists),
            "not_exists" | "!exists" => Ok(AssertionOperator::NotExists),
            _ => Err(ValidationError::UnknownOperator {
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for AssertionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionRule {
    #[serde(rename = "type")]
    pub kind: AssertionKind,
    #[serde(default, alias = "field", skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
    pub operator: AssertionOperator,
    #[serde(default, alias = "expected")]
    pub expected_value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl AssertionRule {
    #[must_use]
    pub fn new(kind: AssertionKind, operator: AssertionOperator, expected: &str) -> Self {
        Self {
            kind,
            field_path: None,
            operator,
            expected_value: expected.to_owned(),
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: &str) -> Self {
        self.field_path = Some(field.to_owned());
        self
    }

    /// Checks that the rule carries what its kind and operator need.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAssertion`] when a `json_path` or
    /// `header` rule has no field, or a comparing operator has no expected
    /// value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.kind.needs_field() && self.field_path.as_deref().is_none_or(str::is_empty) {
            return Err(ValidationError::InvalidAssertion {
                value: self.to_string(),
                reason: "json_path and header assertions need a field, e.g. header:X-Cache",
            });
        }
        if self.operator.takes_value() && self.expected_value.is_empty() {
            return Err(ValidationError::InvalidAssertion {
                value: self.to_string(),
                reason: "missing expected value",
            });
        }
        Ok(())
    }
}

impl fmt::Display for AssertionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(field) = self.field_path.as_deref() {
            write!(f, ":{field}")?;
        }
        write!(f, " {}", self.operator)?;
        if !self.expected_value.is_empty() {
            write!(f, " {}", self.expected_value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    #[serde(rename = "type")]
    pub kind: AssertionKind,
    pub operator: AssertionOperator,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
    pub message: String,
}
