use std::collections::{BTreeMap, BTreeSet};

use reqwest::Url;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::form_urlencoded::byte_serialize;

use super::template::{builtin_variables, render_tracked, uses_builtin_variables};
use crate::args::{BodyContentType, HttpMethod};
use crate::error::ConfigError;

/// How a request authenticates. `basic` is turned into a header by the
/// executor; the others become plain headers during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthDescriptor {
    #[default]
    None,
    Basic {
        username: String,
        #[serde(default)]
        password: String,
    },
    Bearer {
        token: String,
    },
    #[serde(rename = "apikey")]
    ApiKey {
        key_name: String,
        key_value: String,
    },
}

/// A request as configured, possibly holding `{{name}}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTemplate {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub query_params: Vec<(String, String)>,
    pub body: String,
    pub body_content_type: BodyContentType,
    pub auth: AuthDescriptor,
}

impl RequestTemplate {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    fn uses_builtin_variables(&self) -> bool {
        let auth_uses = match &self.auth {
            AuthDescriptor::None => false,
            AuthDescriptor::Basic { username, password } => {
                uses_builtin_variables(username) || uses_builtin_variables(password)
            }
            AuthDescriptor::Bearer { token } => uses_builtin_variables(token),
            AuthDescriptor::ApiKey {
                key_name,
                key_value,
            } => uses_builtin_variables(key_name) || uses_builtin_variables(key_value),
        };
        auth_uses
            || uses_builtin_variables(&self.url)
            || uses_builtin_variables(&self.body)
            || self
                .headers
                .iter()
                .chain(self.query_params.iter())
                .any(|(key, value)| uses_builtin_variables(key) || uses_builtin_variables(value))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Fully resolved, ready-to-send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub url: Url,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub body_content_type: BodyContentType,
    pub credentials: Option<BasicCredentials>,
}

impl RequestSpec {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Turns templates into [`RequestSpec`]s against one environment.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'env> {
    environment: &'env Environment,
    strict: bool,
}

impl<'env> Resolver<'env> {
    #[must_use]
    pub const fn new(environment: &'env Environment) -> Self {
        Self {
            environment,
            strict: false,
        }
    }

    /// Fail on unresolved placeholders instead of sending them verbatim.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Resolves `template` with call-site `variables` layered over the
    /// environment's variables.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the URL or base URL cannot be parsed,
    /// a relative URL has no base URL, a header or auth value is not valid
    /// on the wire, or (in strict mode) a placeholder has no value.
    pub fn resolve(
        &self,
        template: &RequestTemplate,
        variables: &BTreeMap<String, String>,
    ) -> Result<RequestSpec, ConfigError> {
        let mut vars = self.environment.variables.clone();
        vars.extend(
            variables
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        let mut missing = BTreeSet::new();

        let url = self.resolve_url(template, &vars, &mut missing)?;

        let mut headers: Vec<(String, String)> = Vec::with_capacity(template.headers.len());
        for (key, value) in &template.headers {
            let name = render_tracked(key, &vars, &mut missing).trim().to_owned();
            if name.is_empty() {
                continue;
            }
            let value = render_tracked(value, &vars, &mut missing);
            upsert_header(&mut headers, name, value);
        }

        let credentials = match &template.auth {
            AuthDescriptor::None => None,
            AuthDescriptor::Basic { username, password } => {
                let username = render_tracked(username, &vars, &mut missing);
                if username.is_empty() {
                    return Err(ConfigError::InvalidAuth {
                        reason: "basic auth username is empty",
                    });
                }
                Some(BasicCredentials {
                    username,
                    password: render_tracked(password, &vars, &mut missing),
                })
            }
            AuthDescriptor::Bearer { token } => {
                let token = render_tracked(token, &vars, &mut missing);
                if token.trim().is_empty() {
                    return Err(ConfigError::InvalidAuth {
                        reason: "bearer token is empty",
                    });
                }
                upsert_header(
                    &mut headers,
                    "Authorization".to_owned(),
                    format!("Bearer {}", token.trim()),
                );
                None
            }
            AuthDescriptor::ApiKey {
                key_name,
                key_value,
            } => {
                let name = render_tracked(key_name, &vars, &mut missing)
                    .trim()
                    .to_owned();
                if name.is_empty() {
                    return Err(ConfigError::InvalidAuth {
                        reason: "api key header name is empty",
                    });
                }
                let value = render_tracked(key_value, &vars, &mut missing);
                upsert_header(&mut headers, name, value);
                None
            }
        };

        let body = render_tracked(&template.body, &vars, &mut missing);
        if let Some(content_type) = template.body_content_type.header_value()
            && !headers
                .iter()
                .any(|(key, _)| key.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("Content-Type".to_owned(), content_type.to_owned()));
        }

        if self.strict && !missing.is_empty() {
            let names: Vec<String> = missing.into_iter().collect();
            return Err(ConfigError::UnresolvedVariables {
                names: names.join(", "),
            });
        }

        for (name, value) in &headers {
            validate_header(name, value)?;
        }

        Ok(RequestSpec {
            url,
            method: template.method,
            headers,
            body,
            body_content_type: template.body_content_type,
            credentials,
        })
    }

    fn resolve_url(
        &self,
        template: &RequestTemplate,
        vars: &BTreeMap<String, String>,
        missing: &mut BTreeSet<String>,
    ) -> Result<Url, ConfigError> {
        let rendered = render_tracked(&template.url, vars, missing);
        let rendered = rendered.trim();
        if rendered.is_empty() {
            return Err(ConfigError::MissingUrl);
        }

        let mut full = if rendered.starts_with('/') {
            let base = self
                .environment
                .base_url
                .as_deref()
                .map(|base| render_tracked(base, vars, missing))
                .ok_or_else(|| ConfigError::MissingBaseUrl {
                    path: rendered.to_owned(),
                })?;
            let base = base.trim();
            Url::parse(base).map_err(|err| ConfigError::InvalidBaseUrl {
                url: base.to_owned(),
                source: err,
            })?;
            format!("{}{}", base.trim_end_matches('/'), rendered)
        } else {
            rendered.to_owned()
        };

        let query = encode_query(&template.query_params, vars, missing);
        if !query.is_empty() {
            full = append_query(&full, &query);
        }

        let url = Url::parse(&full).map_err(|err| ConfigError::InvalidUrl {
            url: full.clone(),
            source: err,
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme {
                scheme: other.to_owned(),
            }),
        }
    }
}

/// One-shot resolution with a non-strict resolver.
///
/// # Errors
///
/// See [`Resolver::resolve`].
pub fn resolve(
    template: &RequestTemplate,
    variables: &BTreeMap<String, String>,
    environment: &Environment,
) -> Result<RequestSpec, ConfigError> {
    Resolver::new(environment).resolve(template, variables)
}

fn encode_query(
    params: &[(String, String)],
    vars: &BTreeMap<String, String>,
    missing: &mut BTreeSet<String>,
) -> String {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in params {
        let key = render_tracked(key, vars, missing);
        if key.is_empty() {
            continue;
        }
        let value = render_tracked(value, vars, missing);
        let key: String = byte_serialize(key.as_bytes()).collect();
        let value: String = byte_serialize(value.as_bytes()).collect();
        pairs.push(format!("{key}={value}"));
    }
    pairs.join("&")
}

fn append_query(url: &str, query: &str) -> String {
    let (head, fragment) = match url.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (url, None),
    };
    let separator = if !head.contains('?') {
        "?"
    } else if head.ends_with('?') || head.ends_with('&') {
        ""
    } else {
        "&"
    };
    let mut joined = format!("{head}{separator}{query}");
    if let Some(fragment) = fragment {
        joined.push('#');
        joined.push_str(fragment);
    }
    joined
}

fn upsert_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    if let Some(existing) = headers
        .iter_mut()
        .find(|(key, _)| key.eq_ignore_ascii_case(&name))
    {
        *existing = (name, value);
    } else {
        headers.push((name, value));
    }
}

fn validate_header(name: &str, value: &str) -> Result<(), ConfigError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_err| ConfigError::InvalidHeaderName {
        name: name.to_owned(),
    })?;
    HeaderValue::from_str(value).map_err(|_err| ConfigError::InvalidHeaderValue {
        name: name.to_owned(),
    })?;
    Ok(())
}

/// Produces the [`RequestSpec`] for every dispatched request of a run.
/// Templates without per-request variables are resolved once up front.
#[derive(Debug, Clone)]
pub struct RequestFactory {
    template: RequestTemplate,
    environment: Environment,
    variables: BTreeMap<String, String>,
    strict: bool,
    fixed: Option<RequestSpec>,
}

impl RequestFactory {
    /// Resolves the template once to surface configuration errors before
    /// any network activity.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve`].
    pub fn new(
        template: RequestTemplate,
        environment: Environment,
        variables: BTreeMap<String, String>,
        strict: bool,
    ) -> Result<Self, ConfigError> {
        let per_request = template.uses_builtin_variables();
        let mut probe_vars = variables.clone();
        probe_vars.extend(builtin_variables(0, 0));
        let probe = Resolver::new(&environment)
            .strict(strict)
            .resolve(&template, &probe_vars)?;
        let fixed = if per_request { None } else { Some(probe) };
        Ok(Self {
            template,
            environment,
            variables,
            strict,
            fixed,
        })
    }

    #[must_use]
    pub const fn is_per_request(&self) -> bool {
        self.fixed.is_none()
    }

    /// # Errors
    ///
    /// See [`Resolver::resolve`]. Only per-request templates can fail here.
    pub fn spec_for(&self, seq: u64, lane: usize) -> Result<RequestSpec, ConfigError> {
        if let Some(spec) = &self.fixed {
            return Ok(spec.clone());
        }
        let mut vars = self.variables.clone();
        vars.extend(builtin_variables(seq, lane));
        Resolver::new(&self.environment)
            .strict(self.strict)
            .resolve(&self.template, &vars)
    }
}
