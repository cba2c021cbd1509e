use clap::ArgMatches;

use crate::args::RunArgs;
use crate::error::{AppError, AppResult, ConfigError};
use crate::http::{AuthDescriptor, RequestTemplate};

use super::super::types::RequestConfig;
use super::util::{is_cli, parse_headers, parse_query};

/// Builds a template from a config `[request]` table. The URL may still be
/// empty; callers that need one check it.
pub(super) fn template_from_config(request: &RequestConfig) -> AppResult<RequestTemplate> {
    Ok(RequestTemplate {
        url: request.url.clone().unwrap_or_default(),
        method: request.method.unwrap_or_default(),
        headers: parse_headers(request.headers.as_deref().unwrap_or_default())?,
        query_params: parse_query(request.query.as_deref().unwrap_or_default())?,
        body: request.body.clone().unwrap_or_default(),
        body_content_type: request.body_type.unwrap_or_default(),
        auth: request.auth.clone().unwrap_or_default(),
    })
}

/// Lays explicit command-line request flags over a config template.
pub(super) fn apply_cli_request(
    template: &mut RequestTemplate,
    args: &RunArgs,
    matches: &ArgMatches,
) -> AppResult<()> {
    if let Some(url) = args.url.as_ref() {
        template.url.clone_from(url);
    }
    if is_cli(matches, "method") {
        template.method = args.method;
    }
    if is_cli(matches, "headers") {
        template.headers.clone_from(&args.headers);
    }
    if is_cli(matches, "query") {
        template.query_params.clone_from(&args.query);
    }
    if is_cli(matches, "data") {
        template.body.clone_from(&args.data);
    }
    if is_cli(matches, "body_type") {
        template.body_content_type = args.body_type;
    }
    if let Some(auth) = cli_auth(args)? {
        template.auth = auth;
    }
    Ok(())
}

fn cli_auth(args: &RunArgs) -> AppResult<Option<AuthDescriptor>> {
    let given = [
        args.basic_auth.is_some(),
        args.bearer.is_some(),
        args.api_key.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    if given > 1 {
        return Err(AppError::config(ConfigError::AuthConflict));
    }

    if let Some((username, password)) = args.basic_auth.clone() {
        return Ok(Some(AuthDescriptor::Basic { username, password }));
    }
    if let Some(token) = args.bearer.clone() {
        return Ok(Some(AuthDescriptor::Bearer { token }));
    }
    if let Some((key_name, key_value)) = args.api_key.clone() {
        return Ok(Some(AuthDescriptor::ApiKey {
            key_name,
            key_value,
        }));
    }
    Ok(None)
}

pub(super) fn ensure_url(template: &RequestTemplate) -> AppResult<()> {
    if template.url.trim().is_empty() {
        return Err(AppError::config(ConfigError::MissingUrl));
    }
    Ok(())
}
