use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::{Client, redirect};
use tokio::time::Instant;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

use crate::args::DEFAULT_USER_AGENT;
use crate::error::{AppError, AppResult, HttpError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REDIRECT_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Whole-request budget, headers and body included.
    pub timeout: Duration,
    pub connect_timeout: Option<Duration>,
    pub redirect_limit: u32,
    pub insecure: bool,
    pub disable_keepalive: bool,
    pub user_agent: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: None,
            redirect_limit: DEFAULT_REDIRECT_LIMIT,
            insecure: false,
            disable_keepalive: false,
            user_agent: Some(DEFAULT_USER_AGENT.to_owned()),
        }
    }
}

/// Last DNS lookup time seen by one client, in microseconds. Zero means no
/// lookup happened since the last [`DnsTimings::take`].
#[derive(Debug, Default)]
pub(crate) struct DnsTimings {
    last_micros: AtomicU64,
}

impl DnsTimings {
    fn record(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros())
            .unwrap_or(u64::MAX)
            .max(1);
        self.last_micros.store(micros, Ordering::Relaxed);
    }

    pub(crate) fn take(&self) -> Duration {
        Duration::from_micros(self.last_micros.swap(0, Ordering::Relaxed))
    }
}

/// System resolver that reports how long each lookup took.
#[derive(Debug, Clone)]
pub(crate) struct TimedResolver {
    timings: Arc<DnsTimings>,
}

impl TimedResolver {
    pub(crate) const fn new(timings: Arc<DnsTimings>) -> Self {
        Self { timings }
    }
}

impl Resolve for TimedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let timings = Arc::clone(&self.timings);
        Box::pin(async move {
            let host = name.as_str().to_owned();
            let started = Instant::now();
            let resolved = tokio::net::lookup_host((host.as_str(), 0)).await;
            timings.record(started.elapsed());
            let addrs: Vec<SocketAddr> = resolved.map_err(BoxError::from)?.collect();
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<Addrs, BoxError>(addrs)
        })
    }
}

/// Builds a client with its own connection pool and timed resolver.
///
/// # Errors
///
/// Returns an error when reqwest cannot build the client (for example the
/// TLS backend fails to initialize).
pub(crate) fn build_client(
    settings: &ClientSettings,
    timings: &Arc<DnsTimings>,
) -> AppResult<Client> {
    let mut client_builder = Client::builder()
        .timeout(settings.timeout)
        .dns_resolver(Arc::new(TimedResolver::new(Arc::clone(timings))));

    if let Some(connect_timeout) = settings.connect_timeout {
        client_builder = client_builder.connect_timeout(connect_timeout);
    }

    if let Some(user_agent) = settings.user_agent.as_deref() {
        client_builder = client_builder.user_agent(user_agent);
    }

    if settings.redirect_limit == 0 {
        client_builder = client_builder.redirect(redirect::Policy::none());
    } else {
        client_builder = client_builder.redirect(redirect::Policy::limited(
            usize::try_from(settings.redirect_limit).unwrap_or(10),
        ));
    }

    if settings.disable_keepalive {
        client_builder = client_builder
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Some(Duration::from_secs(0)));
    }

    if settings.insecure {
        client_builder = client_builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    client_builder
        .build()
        .map_err(|err| AppError::http(HttpError::BuildClientFailed { source: err }))
}
