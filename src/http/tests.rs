use super::template::placeholder_names;
use super::*;
use crate::args::{BodyContentType, HttpMethod};
use crate::error::ConfigError;
use crate::metrics::CacheStatus;
use reqwest::header::{HeaderMap, HeaderValue};
use std::collections::BTreeMap;

fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

fn env_with_base(base: &str) -> Environment {
    Environment {
        base_url: Some(base.to_owned()),
        variables: BTreeMap::new(),
    }
}

#[test]
fn render_template_substitutes_vars() -> Result<(), String> {
    let rendered = render_template(
        "/users/{{ id }}/{{kind}}?x={{missing}}",
        &vars(&[("id", "42"), ("kind", "posts")]),
    );
    if rendered != "/users/42/posts?x={{missing}}" {
        return Err(format!("Unexpected render: {}", rendered));
    }
    Ok(())
}

#[test]
fn render_template_keeps_unterminated_braces() -> Result<(), String> {
    let rendered = render_template("a {{b", &vars(&[("b", "x")]));
    if rendered != "a {{b" {
        return Err(format!("Unexpected render: {}", rendered));
    }
    Ok(())
}

#[test]
fn placeholder_names_are_trimmed() -> Result<(), String> {
    let names = placeholder_names("{{ a }}-{{b}}-{{}}");
    if names != vec!["a".to_owned(), "b".to_owned()] {
        return Err(format!("Unexpected names: {:?}", names));
    }
    Ok(())
}

#[test]
fn resolve_joins_base_url_and_encodes_query() -> Result<(), String> {
    let mut template = RequestTemplate::get("/search");
    template.query_params = vec![
        ("q".to_owned(), "a b&c".to_owned()),
        (String::new(), "dropped".to_owned()),
        ("page".to_owned(), "{{page}}".to_owned()),
    ];
    let spec = resolve(
        &template,
        &vars(&[("page", "2")]),
        &env_with_base("https://api.example.com/v1/"),
    )
    .map_err(|err| err.to_string())?;
    if spec.url.as_str() != "https://api.example.com/v1/search?q=a+b%26c&page=2" {
        return Err(format!("Unexpected url: {}", spec.url));
    }
    Ok(())
}

#[test]
fn resolve_appends_query_to_existing_query_before_fragment() -> Result<(), String> {
    let mut template = RequestTemplate::get("http://localhost/a?x=1#frag");
    template.query_params = vec![("y".to_owned(), "2".to_owned())];
    let spec = resolve(&template, &BTreeMap::new(), &Environment::default())
        .map_err(|err| err.to_string())?;
    if spec.url.as_str() != "http://localhost/a?x=1&y=2#frag" {
        return Err(format!("Unexpected url: {}", spec.url));
    }
    Ok(())
}

#[test]
fn resolve_relative_url_without_base_fails() -> Result<(), String> {
    match resolve(
        &RequestTemplate::get("/health"),
        &BTreeMap::new(),
        &Environment::default(),
    ) {
        Err(ConfigError::MissingBaseUrl { path }) if path == "/health" => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected missing base url".to_owned()),
    }
}

#[test]
fn resolve_rejects_malformed_base_url() -> Result<(), String> {
    match resolve(
        &RequestTemplate::get("/health"),
        &BTreeMap::new(),
        &env_with_base("not a url"),
    ) {
        Err(ConfigError::InvalidBaseUrl { .. }) => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected invalid base url".to_owned()),
    }
}

#[test]
fn resolve_rejects_non_http_scheme() -> Result<(), String> {
    match resolve(
        &RequestTemplate::get("ftp://files.local/x"),
        &BTreeMap::new(),
        &Environment::default(),
    ) {
        Err(ConfigError::UnsupportedScheme { scheme }) if scheme == "ftp" => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected unsupported scheme".to_owned()),
    }
}

#[test]
fn resolve_headers_last_write_wins_case_insensitive() -> Result<(), String> {
    let mut template = RequestTemplate::get("http://localhost");
    template.headers = vec![
        ("X-Trace".to_owned(), "one".to_owned()),
        ("x-trace".to_owned(), "two".to_owned()),
        ("Accept".to_owned(), "*/*".to_owned()),
    ];
    let spec = resolve(&template, &BTreeMap::new(), &Environment::default())
        .map_err(|err| err.to_string())?;
    if spec.headers
        != vec![
            ("x-trace".to_owned(), "two".to_owned()),
            ("Accept".to_owned(), "*/*".to_owned()),
        ]
    {
        return Err(format!("Unexpected headers: {:?}", spec.headers));
    }
    Ok(())
}

#[test]
fn resolve_auth_descriptors() -> Result<(), String> {
    let environment = Environment {
        base_url: None,
        variables: vars(&[("token", "secret")]),
    };

    let mut bearer = RequestTemplate::get("http://localhost");
    bearer.auth = AuthDescriptor::Bearer {
        token: "{{token}}".to_owned(),
    };
    let spec = resolve(&bearer, &BTreeMap::new(), &environment).map_err(|err| err.to_string())?;
    if spec.header("authorization") != Some("Bearer secret") {
        return Err("Expected bearer header".to_owned());
    }

    let mut api_key = RequestTemplate::get("http://localhost");
    api_key.auth = AuthDescriptor::ApiKey {
        key_name: "X-Api-Key".to_owned(),
        key_value: "k1".to_owned(),
    };
    let spec = resolve(&api_key, &BTreeMap::new(), &environment).map_err(|err| err.to_string())?;
    if spec.header("x-api-key") != Some("k1") || spec.credentials.is_some() {
        return Err("Expected api key header".to_owned());
    }

    let mut basic = RequestTemplate::get("http://localhost");
    basic.auth = AuthDescriptor::Basic {
        username: "alice".to_owned(),
        password: "pw".to_owned(),
    };
    let spec = resolve(&basic, &BTreeMap::new(), &environment).map_err(|err| err.to_string())?;
    let expected = BasicCredentials {
        username: "alice".to_owned(),
        password: "pw".to_owned(),
    };
    if spec.credentials != Some(expected) || spec.header("authorization").is_some() {
        return Err("Expected basic credentials without header".to_owned());
    }

    let mut empty = RequestTemplate::get("http://localhost");
    empty.auth = AuthDescriptor::Bearer {
        token: " ".to_owned(),
    };
    match resolve(&empty, &BTreeMap::new(), &environment) {
        Err(ConfigError::InvalidAuth { .. }) => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected empty bearer to fail".to_owned()),
    }
}

#[test]
fn resolve_adds_content_type_only_when_absent() -> Result<(), String> {
    let mut template = RequestTemplate::get("http://localhost");
    template.method = HttpMethod::Post;
    template.body = "{\"a\":1}".to_owned();
    template.body_content_type = BodyContentType::Json;
    let spec = resolve(&template, &BTreeMap::new(), &Environment::default())
        .map_err(|err| err.to_string())?;
    if spec.header("content-type") != Some("application/json") {
        return Err("Expected json content type".to_owned());
    }

    template.headers = vec![("content-type".to_owned(), "application/vnd+json".to_owned())];
    let spec = resolve(&template, &BTreeMap::new(), &Environment::default())
        .map_err(|err| err.to_string())?;
    if spec.header("Content-Type") != Some("application/vnd+json") || spec.headers.len() != 1 {
        return Err(format!("Explicit header should win: {:?}", spec.headers));
    }
    Ok(())
}

#[test]
fn call_site_variables_override_environment() -> Result<(), String> {
    let environment = Environment {
        base_url: Some("http://{{host}}".to_owned()),
        variables: vars(&[("host", "env.local"), ("id", "1")]),
    };
    let spec = resolve(
        &RequestTemplate::get("/items/{{id}}"),
        &vars(&[("id", "9")]),
        &environment,
    )
    .map_err(|err| err.to_string())?;
    if spec.url.as_str() != "http://env.local/items/9" {
        return Err(format!("Unexpected url: {}", spec.url));
    }
    Ok(())
}

#[test]
fn strict_resolver_reports_unresolved_names() -> Result<(), String> {
    let mut template = RequestTemplate::get("http://localhost/{{a}}");
    template.headers = vec![("X-B".to_owned(), "{{b}}".to_owned())];
    let environment = Environment::default();

    let lenient = Resolver::new(&environment)
        .resolve(&template, &BTreeMap::new())
        .map_err(|err| err.to_string())?;
    if lenient.header("x-b") != Some("{{b}}") {
        return Err("Lenient mode should keep placeholders".to_owned());
    }

    match Resolver::new(&environment)
        .strict(true)
        .resolve(&template, &BTreeMap::new())
    {
        Err(ConfigError::UnresolvedVariables { names }) if names == "a, b" => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected unresolved variables".to_owned()),
    }
}

#[test]
fn invalid_header_value_is_rejected() -> Result<(), String> {
    let mut template = RequestTemplate::get("http://localhost");
    template.headers = vec![("X-Bad".to_owned(), "line\nbreak".to_owned())];
    match resolve(&template, &BTreeMap::new(), &Environment::default()) {
        Err(ConfigError::InvalidHeaderValue { name }) if name == "X-Bad" => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected invalid header value".to_owned()),
    }
}

#[test]
fn request_factory_resolves_builtins_per_request() -> Result<(), String> {
    let fixed = RequestFactory::new(
        RequestTemplate::get("http://localhost/static"),
        Environment::default(),
        BTreeMap::new(),
        true,
    )
    .map_err(|err| err.to_string())?;
    if fixed.is_per_request() {
        return Err("Static template should resolve once".to_owned());
    }

    let dynamic = RequestFactory::new(
        RequestTemplate::get("http://localhost/items/{{seq}}?lane={{lane}}"),
        Environment::default(),
        BTreeMap::new(),
        true,
    )
    .map_err(|err| err.to_string())?;
    if !dynamic.is_per_request() {
        return Err("Builtin template should resolve per request".to_owned());
    }
    let spec = dynamic.spec_for(7, 3).map_err(|err| err.to_string())?;
    if spec.url.as_str() != "http://localhost/items/7?lane=3" {
        return Err(format!("Unexpected url: {}", spec.url));
    }
    Ok(())
}

#[test]
fn request_factory_surfaces_config_errors_up_front() -> Result<(), String> {
    match RequestFactory::new(
        RequestTemplate::get("::not-a-url"),
        Environment::default(),
        BTreeMap::new(),
        false,
    ) {
        Err(ConfigError::InvalidUrl { .. }) => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected invalid url".to_owned()),
    }
}

#[test]
fn cache_rule_matches_prefix_ignoring_case() -> Result<(), String> {
    let rule = CacheRule::default();
    let mut headers = HeaderMap::new();
    if rule.classify(&headers) != CacheStatus::Miss {
        return Err("Absent header should be MISS".to_owned());
    }
    headers.insert("x-cache", HeaderValue::from_static("hit from cloudfront"));
    if rule.classify(&headers) != CacheStatus::Hit {
        return Err("Prefix HIT should count".to_owned());
    }
    headers.insert("x-cache", HeaderValue::from_static("MISS from cloudfront"));
    if rule.classify(&headers) != CacheStatus::Miss {
        return Err("MISS should not count".to_owned());
    }

    let custom = CacheRule::new(
        "CF-Cache-Status".to_owned(),
        vec!["HIT".to_owned(), "REVALIDATED".to_owned()],
    );
    let mut headers = HeaderMap::new();
    headers.insert("cf-cache-status", HeaderValue::from_static("REVALIDATED"));
    if custom.classify(&headers) != CacheStatus::Hit {
        return Err("Custom hit value should count".to_owned());
    }
    Ok(())
}

#[test]
fn auth_descriptor_deserializes_tagged() -> Result<(), String> {
    let auth: AuthDescriptor = serde_json::from_str(
        r#"{"type":"apikey","key_name":"X-Key","key_value":"v"}"#,
    )
    .map_err(|err| err.to_string())?;
    if auth
        != (AuthDescriptor::ApiKey {
            key_name: "X-Key".to_owned(),
            key_value: "v".to_owned(),
        })
    {
        return Err(format!("Unexpected auth: {:?}", auth));
    }
    Ok(())
}

#[test]
fn lane_client_failure_names_the_lane() -> Result<(), String> {
    let mut settings = ExecutorSettings::default();
    settings.client.user_agent = Some("bad\nagent".to_owned());
    let factory = HttpExecutorFactory::new(settings);
    let Err(crate::error::AppError::Http(crate::error::HttpError::LaneClientFailed { lane, .. })) =
        factory.lane_executor(3)
    else {
        return Err("Expected a lane client error".to_owned());
    };
    if lane != 3 {
        return Err(format!("Unexpected lane {}", lane));
    }
    Ok(())
}
