//! Request resolution and timed HTTP execution.
mod client;
mod executor;
mod resolve;
mod template;

#[cfg(test)]
mod tests;

pub use client::{ClientSettings, DEFAULT_REDIRECT_LIMIT, DEFAULT_TIMEOUT};
pub use executor::{
    CacheRule, DEFAULT_BODY_CAPTURE_LIMIT, DEFAULT_CACHE_HEADER, DEFAULT_CACHE_HIT_VALUES,
    Execution, ExecutorFactory, ExecutorSettings, HttpExecutor, HttpExecutorFactory,
    RequestExecutor, ResponseCapture,
};
pub use resolve::{
    AuthDescriptor, BasicCredentials, Environment, RequestFactory, RequestSpec, RequestTemplate,
    Resolver, resolve,
};
pub use template::{BUILTIN_VARIABLES, render_template};
