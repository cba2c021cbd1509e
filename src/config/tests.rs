use super::types::{ConfigFile, DurationValue};
use super::{build_bulk_entries, build_chain_plan, build_run_request, load_config_file};
use crate::args::{Cli, HttpMethod, RunArgs};
use crate::assertions::AssertionKind;
use crate::chain::ExtractionSource;
use crate::engine::RunRequest;
use crate::error::{AppError, ConfigError};
use crate::http::AuthDescriptor;
use crate::load::{LoadProfile, PhaseKind};
use clap::{CommandFactory, FromArgMatches};
use std::time::Duration;
use tempfile::tempdir;

fn write_config(name: &str, content: &str) -> Result<(tempfile::TempDir, ConfigFile), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join(name);
    std::fs::write(&path, content).map_err(|err| format!("write failed: {}", err))?;
    let config = load_config_file(&path).map_err(|err| err.to_string())?;
    Ok((dir, config))
}

fn run_request(argv: &[&str], config: Option<&ConfigFile>) -> Result<RunRequest, AppError> {
    let mut full = vec!["loadlens", "run"];
    full.extend_from_slice(argv);
    let matches = Cli::command().try_get_matches_from(full)?;
    let Some(run_matches) = matches.subcommand_matches("run") else {
        return Err(AppError::validation("Expected run subcommand"));
    };
    let args = RunArgs::from_arg_matches(run_matches)?;
    build_run_request(&args, run_matches, config)
}

#[test]
fn parse_toml_config_sections() -> Result<(), String> {
    let (_dir, config) = write_config(
        "loadlens.toml",
        r#"
timeout = "5s"
cache_header = "CF-Cache-Status"

[request]
url = "/users/{{id}}"
method = "post"
headers = ["Accept: application/json"]
query = ["page=1"]
body = '{"name":"x"}'
body_type = "json"
auth = { type = "bearer", token = "{{token}}" }

[environment]
base_url = "https://api.example.com"
variables = { token = "abc" }

[variables]
id = "7"

[load]
concurrency = 4
iterations = 25

[[assertions]]
type = "status_code"
operator = "equals"
expected = "201"
"#,
    )?;

    let request = config.request.as_ref().ok_or("Expected [request]")?;
    if request.method != Some(HttpMethod::Post) {
        return Err("Unexpected method".to_owned());
    }
    if !matches!(request.auth, Some(AuthDescriptor::Bearer { .. })) {
        return Err("Expected bearer auth".to_owned());
    }
    let environment = config.environment.as_ref().ok_or("Expected [environment]")?;
    if environment.base_url.as_deref() != Some("https://api.example.com") {
        return Err("Unexpected base url".to_owned());
    }
    if !matches!(config.timeout, Some(DurationValue::Text(ref text)) if text == "5s") {
        return Err("Unexpected timeout".to_owned());
    }
    let assertions = config.assertions.as_ref().ok_or("Expected assertions")?;
    if assertions.first().map(|rule| rule.expected_value.as_str()) != Some("201") {
        return Err("Unexpected assertion".to_owned());
    }
    Ok(())
}

#[test]
fn parse_json_config_with_phases() -> Result<(), String> {
    let (_dir, config) = write_config(
        "loadlens.json",
        r#"{
  "request": { "url": "http://localhost:8080/health" },
  "load": {
    "phased": {
      "warmup": { "duration": 2, "vus": 1 },
      "ramp_up": { "duration": "3s", "target_vus": 10 },
      "sustain": { "duration": "5s", "vus": 10 },
      "ramp_down": { "duration": 0 }
    }
  }
}"#,
    )?;
    let request = run_request(&[], Some(&config)).map_err(|err| err.to_string())?;
    let LoadProfile::Phased(phased) = request.profile else {
        return Err("Expected phased profile".to_owned());
    };
    if phased.phase(PhaseKind::Warmup).duration != Duration::from_secs(2) {
        return Err("Unexpected warmup duration".to_owned());
    }
    if phased.phase(PhaseKind::RampUp).target_vus != 10 {
        return Err("Unexpected ramp-up target".to_owned());
    }
    if !phased.phase(PhaseKind::RampDown).duration.is_zero() {
        return Err("Expected zero ramp-down".to_owned());
    }
    Ok(())
}

#[test]
fn unsupported_extension_is_rejected() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("loadlens.yaml");
    std::fs::write(&path, "url: x").map_err(|err| format!("write failed: {}", err))?;
    match load_config_file(&path) {
        Err(AppError::Config(ConfigError::UnsupportedExtension { ext })) if ext == "yaml" => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected yaml to be rejected".to_owned()),
    }
}

#[test]
fn cli_values_override_config() -> Result<(), String> {
    let (_dir, config) = write_config(
        "loadlens.toml",
        r#"
timeout = "5s"
max_concurrency = 50

[request]
url = "http://config.local/a"
method = "put"
headers = ["X-From: config"]

[load]
concurrency = 3
iterations = 4
"#,
    )?;
    let request = run_request(
        &["-u", "http://cli.local/b", "-n", "8", "--timeout", "2s"],
        Some(&config),
    )
    .map_err(|err| err.to_string())?;

    if request.template.url != "http://cli.local/b" {
        return Err("CLI url should win".to_owned());
    }
    if request.template.method != HttpMethod::Put {
        return Err("Config method should apply when CLI uses its default".to_owned());
    }
    if request.template.headers != vec![("X-From".to_owned(), "config".to_owned())] {
        return Err("Config headers should apply".to_owned());
    }
    if request.profile
        != (LoadProfile::Flat {
            concurrency: 8,
            iterations: 4,
        })
    {
        return Err(format!("Unexpected profile {:?}", request.profile));
    }
    if request.executor.client.timeout != Duration::from_secs(2) {
        return Err("CLI timeout should win".to_owned());
    }
    if request.max_concurrency != 50 {
        return Err("Config max_concurrency should apply".to_owned());
    }
    Ok(())
}

#[test]
fn run_without_url_is_a_config_error() -> Result<(), String> {
    match run_request(&[], None) {
        Err(AppError::Config(ConfigError::MissingUrl)) => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected missing url".to_owned()),
    }
}

#[test]
fn cli_max_vus_builds_shorthand_phases() -> Result<(), String> {
    let request = run_request(
        &[
            "-u",
            "http://localhost",
            "--max-vus",
            "50",
            "--warmup",
            "1s",
            "--ramp-up",
            "2s",
            "--sustain",
            "3s",
        ],
        None,
    )
    .map_err(|err| err.to_string())?;
    let LoadProfile::Phased(phased) = request.profile else {
        return Err("Expected phased profile".to_owned());
    };
    if phased.warmup.target_vus != 5 || phased.ramp_up.target_vus != 50 {
        return Err(format!("Unexpected targets {:?}", phased));
    }
    if phased.ramp_down.target_vus != 0 || !phased.ramp_down.duration.is_zero() {
        return Err("Unexpected ramp-down".to_owned());
    }
    Ok(())
}

#[test]
fn mixing_flat_and_phased_flags_conflicts() -> Result<(), String> {
    match run_request(&["-u", "http://localhost", "-n", "2", "--max-vus", "5"], None) {
        Err(AppError::Config(ConfigError::Conflict { .. })) => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected conflict".to_owned()),
    }
}

#[test]
fn multiple_auth_flags_conflict() -> Result<(), String> {
    match run_request(
        &["-u", "http://localhost", "--bearer", "t", "--basic-auth", "a:b"],
        None,
    ) {
        Err(AppError::Config(ConfigError::AuthConflict)) => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected auth conflict".to_owned()),
    }
}

#[test]
fn cli_vars_layer_over_config_variables() -> Result<(), String> {
    let (_dir, config) = write_config(
        "loadlens.toml",
        r#"
[request]
url = "http://localhost/{{a}}/{{b}}"

[variables]
a = "one"
b = "two"
"#,
    )?;
    let request =
        run_request(&["--var", "b=cli"], Some(&config)).map_err(|err| err.to_string())?;
    if request.variables.get("a").map(String::as_str) != Some("one") {
        return Err("Config variable should remain".to_owned());
    }
    if request.variables.get("b").map(String::as_str) != Some("cli") {
        return Err("CLI variable should win".to_owned());
    }
    Ok(())
}

#[test]
fn config_assertion_without_field_is_rejected() -> Result<(), String> {
    let (_dir, config) = write_config(
        "loadlens.toml",
        r#"
[request]
url = "http://localhost"

[[assertions]]
type = "header"
operator = "exists"
"#,
    )?;
    match run_request(&[], Some(&config)) {
        Err(AppError::Config(ConfigError::InvalidAssertion { index: 1, .. })) => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected invalid assertion".to_owned()),
    }
}

#[test]
fn cache_settings_from_config() -> Result<(), String> {
    let (_dir, config) = write_config(
        "loadlens.toml",
        r#"
cache_header = "CF-Cache-Status"
cache_hit_values = ["HIT", "REVALIDATED"]

[request]
url = "http://localhost"
"#,
    )?;
    let request = run_request(&[], Some(&config)).map_err(|err| err.to_string())?;
    let expected = crate::http::CacheRule::new(
        "CF-Cache-Status".to_owned(),
        vec!["HIT".to_owned(), "REVALIDATED".to_owned()],
    );
    if request.executor.cache_rule != expected {
        return Err(format!("Unexpected cache rule {:?}", request.executor.cache_rule));
    }
    Ok(())
}

#[test]
fn chain_plan_from_steps() -> Result<(), String> {
    let (_dir, config) = write_config(
        "chain.toml",
        r#"
fail_on_http_error = false

[environment]
base_url = "http://localhost:9000"

[[steps]]
name = "login"
method = "post"
url = "/login"
body = '{"user":"a"}'
body_type = "json"
extract = [{ variable = "token", source = "body", path = "$.token" }]

[[steps]]
url = "/me"
headers = ["Authorization: Bearer {{token}}"]
stop_on_error = false
"#,
    )?;
    let plan = build_chain_plan(&config, &[("extra".to_owned(), "1".to_owned())])
        .map_err(|err| err.to_string())?;
    if plan.steps.len() != 2 || plan.fail_on_http_error {
        return Err("Unexpected plan shape".to_owned());
    }
    let first = plan.steps.first().ok_or("Missing first step")?;
    if first.id != "step-1" || first.name != "login" || !first.stop_on_error {
        return Err(format!("Unexpected first step {:?}", first));
    }
    let extraction = first.extractions.first().ok_or("Missing extraction")?;
    if extraction.variable_name != "token" || extraction.source != ExtractionSource::Body {
        return Err("Unexpected extraction".to_owned());
    }
    let second = plan.steps.get(1).ok_or("Missing second step")?;
    if second.name != "GET /me" || second.stop_on_error {
        return Err(format!("Unexpected second step {:?}", second));
    }
    if plan.variables.get("extra").map(String::as_str) != Some("1") {
        return Err("Expected --var to reach chain globals".to_owned());
    }
    Ok(())
}

#[test]
fn chain_without_steps_is_rejected() -> Result<(), String> {
    match build_chain_plan(&ConfigFile::default(), &[]) {
        Err(AppError::Config(ConfigError::ChainMissingSteps)) => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected missing steps".to_owned()),
    }
}

#[test]
fn bulk_entries_inherit_top_level_values() -> Result<(), String> {
    let (_dir, config) = write_config(
        "bulk.toml",
        r#"
[request]
url = "http://localhost/base"
headers = ["X-Shared: yes"]

[load]
concurrency = 2
iterations = 3

[[assertions]]
type = "status_code"
operator = "lt"
expected = "400"

[[runs]]
name = "default"

[[runs]]
name = "other-path"
request = { url = "http://localhost/other" }
load = { concurrency = 1, iterations = 1 }
"#,
    )?;
    let entries = build_bulk_entries(&config).map_err(|err| err.to_string())?;
    let [first, second] = entries.as_slice() else {
        return Err(format!("Expected two entries, got {}", entries.len()));
    };
    if first.request.template.url != "http://localhost/base"
        || first.request.profile
            != (LoadProfile::Flat {
                concurrency: 2,
                iterations: 3,
            })
    {
        return Err("First entry should inherit".to_owned());
    }
    if second.request.template.url != "http://localhost/other"
        || second.request.template.headers.len() != 1
    {
        return Err("Second entry should override url and keep headers".to_owned());
    }
    if second.request.assertions.first().map(|rule| rule.kind) != Some(AssertionKind::StatusCode)
    {
        return Err("Second entry should inherit assertions".to_owned());
    }
    Ok(())
}

#[test]
fn bulk_entry_errors_name_the_entry() -> Result<(), String> {
    let (_dir, config) = write_config(
        "bulk.toml",
        r#"
[[runs]]
name = "no-url"
"#,
    )?;
    match build_bulk_entries(&config) {
        Err(AppError::Config(ConfigError::InvalidBulkRun { name, .. })) if name == "no-url" => {
            Ok(())
        }
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected invalid entry".to_owned()),
    }
}
