use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid header format: '{value}'. Expected 'Key: Value'")]
    InvalidHeaderFormat { value: String },
    #[error("Invalid pair '{value}'. Expected 'key=value'")]
    InvalidKeyValue { value: String },
    #[error("Invalid credentials '{value}'. Expected 'username:password'")]
    InvalidCredentials { value: String },
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid number: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Unknown assertion type '{value}'. Use status_code, response_time, json_path, or header.")]
    UnknownAssertionType { value: String },
    #[error(
        "Unknown assertion operator '{value}'. Use equals, neq, contains, gt, lt, gte, lte, exists, or not_exists."
    )]
    UnknownOperator { value: String },
    #[error("Invalid assertion '{value}': {reason}")]
    InvalidAssertion { value: String, reason: &'static str },
    #[error("Unknown extraction source '{value}'. Use body, header, or status.")]
    UnknownExtractionSource { value: String },
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
