use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Checked in order; the first one set wins.
const FILTER_ENV_VARS: [&str; 2] = ["LOADLENS_LOG", "RUST_LOG"];

fn fallback_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn,loadlens=info" }
}

fn build_filter(configured: Option<String>, verbose: bool) -> EnvFilter {
    let fallback = || EnvFilter::new(fallback_directive(verbose));
    configured.map_or_else(fallback, |value| {
        EnvFilter::try_new(value).unwrap_or_else(|_| fallback())
    })
}

/// Installs the global subscriber, writing to stderr so stdout stays free
/// for summaries and JSON. Later calls are no-ops.
pub fn init_logging(verbose: bool, no_color: bool) {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let configured = FILTER_ENV_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok());

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(build_filter(configured, verbose))
        .with_ansi(!no_color)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}
