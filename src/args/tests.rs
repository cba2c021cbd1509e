use super::parsers::{parse_assertion, parse_credentials, parse_duration_text};
use super::test_support::{parse_run_args, parse_test_args};
use super::*;
use crate::assertions::{AssertionKind, AssertionOperator};
use crate::error::{AppError, AppResult};
use std::time::Duration;

#[test]
fn run_defaults_are_single_request() -> AppResult<()> {
    let args = parse_run_args(&["--url", "http://localhost"])?;
    if args.concurrency.get() != 1 || args.iterations.get() != 1 {
        return Err(AppError::validation("Expected 1 VU x 1 iteration"));
    }
    if args.method != HttpMethod::Get {
        return Err(AppError::validation("Expected GET default"));
    }
    if args.timeout != Duration::from_secs(30) {
        return Err(AppError::validation("Expected 30s default timeout"));
    }
    if args.max_concurrency != 100 || args.redirect != 10 {
        return Err(AppError::validation("Unexpected transport defaults"));
    }
    if args.cache_header != "X-Cache" || !args.cache_hit_values.is_empty() {
        return Err(AppError::validation("Unexpected cache defaults"));
    }
    if args.max_vus.is_some() || args.warmup_vus_percent != 10 {
        return Err(AppError::validation("Unexpected phased defaults"));
    }
    Ok(())
}

#[test]
fn run_parses_request_flags() -> AppResult<()> {
    let args = parse_run_args(&[
        "-u",
        "/users/{{id}}",
        "-X",
        "post",
        "-H",
        "Accept: application/json",
        "-H",
        "X-Trace:abc",
        "--query",
        "page=2",
        "-d",
        "{\"a\":1}",
        "--body-type",
        "json",
        "--bearer",
        "tok",
        "--base-url",
        "https://api.example.com/",
        "--var",
        "id=42",
        "--strict-variables",
    ])?;
    if args.method != HttpMethod::Post {
        return Err(AppError::validation("Expected POST"));
    }
    if args.headers
        != vec![
            ("Accept".to_owned(), "application/json".to_owned()),
            ("X-Trace".to_owned(), "abc".to_owned()),
        ]
    {
        return Err(AppError::validation("Unexpected headers"));
    }
    if args.query != vec![("page".to_owned(), "2".to_owned())] {
        return Err(AppError::validation("Unexpected query"));
    }
    if args.body_type != BodyContentType::Json || args.data != "{\"a\":1}" {
        return Err(AppError::validation("Unexpected body"));
    }
    if args.variables != vec![("id".to_owned(), "42".to_owned())] || !args.strict_variables {
        return Err(AppError::validation("Unexpected variables"));
    }
    if args.bearer.as_deref() != Some("tok") {
        return Err(AppError::validation("Unexpected bearer"));
    }
    Ok(())
}

#[test]
fn run_parses_phased_flags() -> AppResult<()> {
    let args = parse_run_args(&[
        "-u",
        "http://localhost",
        "--max-vus",
        "20",
        "--warmup",
        "0",
        "--ramp-up",
        "500ms",
        "--sustain",
        "2m",
        "--ramp-down",
        "1s",
    ])?;
    if args.max_vus != Some(20) {
        return Err(AppError::validation("Expected max-vus 20"));
    }
    if !args.warmup.is_zero()
        || args.ramp_up != Duration::from_millis(500)
        || args.sustain != Duration::from_secs(120)
        || args.ramp_down != Duration::from_secs(1)
    {
        return Err(AppError::validation("Unexpected phase durations"));
    }
    Ok(())
}

#[test]
fn run_rejects_zero_concurrency() -> AppResult<()> {
    if parse_run_args(&["-u", "http://localhost", "-n", "0"]).is_ok() {
        return Err(AppError::validation("Expected zero concurrency to fail"));
    }
    if parse_run_args(&["-u", "http://localhost", "--timeout", "0s"]).is_ok() {
        return Err(AppError::validation("Expected zero timeout to fail"));
    }
    Ok(())
}

#[test]
fn run_rejects_malformed_header() -> AppResult<()> {
    if parse_run_args(&["-u", "http://localhost", "-H", "no-colon"]).is_ok() {
        return Err(AppError::validation("Expected header without colon to fail"));
    }
    if parse_run_args(&["-u", "http://localhost", "-H", ": value"]).is_ok() {
        return Err(AppError::validation("Expected empty header name to fail"));
    }
    Ok(())
}

#[test]
fn compare_subcommand_parses_positionals() -> AppResult<()> {
    let cli = parse_test_args([
        "loadlens",
        "compare",
        "base.json",
        "cand.json",
        "--threshold",
        "5",
    ])?;
    let Command::Compare(compare) = cli.command else {
        return Err(AppError::validation("Expected compare subcommand"));
    };
    if compare.baseline != "base.json" || compare.candidate != "cand.json" {
        return Err(AppError::validation("Unexpected compare paths"));
    }
    if (compare.threshold - 5.0).abs() > f64::EPSILON {
        return Err(AppError::validation("Unexpected threshold"));
    }
    Ok(())
}

#[test]
fn global_flags_work_after_subcommand() -> AppResult<()> {
    let cli = parse_test_args(["loadlens", "chain", "-c", "chain.toml", "-v", "--no-color"])?;
    if !cli.verbose || !cli.no_color {
        return Err(AppError::validation("Expected global flags"));
    }
    let Command::Chain(chain) = cli.command else {
        return Err(AppError::validation("Expected chain subcommand"));
    };
    if chain.config != "chain.toml" {
        return Err(AppError::validation("Unexpected chain config"));
    }
    Ok(())
}

#[test]
fn duration_text_units() -> AppResult<()> {
    let cases = [
        ("250ms", Duration::from_millis(250)),
        ("5", Duration::from_secs(5)),
        ("5s", Duration::from_secs(5)),
        ("3m", Duration::from_secs(180)),
        ("1h", Duration::from_secs(3600)),
    ];
    for (input, expected) in cases {
        let parsed = parse_duration_text(input, false)?;
        if parsed != expected {
            return Err(AppError::validation(format!(
                "Unexpected duration for {input}: {parsed:?}"
            )));
        }
    }
    if parse_duration_text("0", false).is_ok() {
        return Err(AppError::validation("Expected zero to be rejected"));
    }
    if parse_duration_text("0", true)? != Duration::ZERO {
        return Err(AppError::validation("Expected zero to be allowed"));
    }
    if parse_duration_text("10d", true).is_ok() || parse_duration_text("ms", true).is_ok() {
        return Err(AppError::validation("Expected bad durations to fail"));
    }
    Ok(())
}

#[test]
fn credentials_keep_colons_in_password() -> AppResult<()> {
    let (user, pass) = parse_credentials("alice:s3:cret")?;
    if user != "alice" || pass != "s3:cret" {
        return Err(AppError::validation("Unexpected credentials split"));
    }
    if parse_credentials(":nouser").is_ok() {
        return Err(AppError::validation("Expected empty user to fail"));
    }
    Ok(())
}

#[test]
fn assertion_parser_accepts_symbols_and_fields() -> AppResult<()> {
    let rule = parse_assertion("status_code == 200")?;
    if rule.kind != AssertionKind::StatusCode
        || rule.operator != AssertionOperator::Equals
        || rule.expected_value != "200"
    {
        return Err(AppError::validation("Unexpected status rule"));
    }

    let rule = parse_assertion("header:X-Cache contains HIT")?;
    if rule.field_path.as_deref() != Some("X-Cache") {
        return Err(AppError::validation("Unexpected header field"));
    }

    let rule = parse_assertion("json_path:$.data.name equals Jane Doe")?;
    if rule.expected_value != "Jane Doe" {
        return Err(AppError::validation("Expected multi-word expected value"));
    }

    let rule = parse_assertion("json_path:$.id exists")?;
    if !rule.expected_value.is_empty() || rule.operator != AssertionOperator::Exists {
        return Err(AppError::validation("Unexpected exists rule"));
    }
    Ok(())
}

#[test]
fn assertion_parser_rejects_incomplete_rules() -> AppResult<()> {
    for input in ["", "status_code", "json_path equals 1", "status_code gt", "bogus eq 1"] {
        if parse_assertion(input).is_ok() {
            return Err(AppError::validation(format!("Expected '{input}' to fail")));
        }
    }
    Ok(())
}
