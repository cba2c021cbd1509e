pub(crate) const DEFAULT_USER_AGENT: &str =
    concat!("loadlens/", env!("CARGO_PKG_VERSION"));

pub(crate) const DEFAULT_CONFIG_TOML: &str = "loadlens.toml";
pub(crate) const DEFAULT_CONFIG_JSON: &str = "loadlens.json";
/// Regression threshold for `compare`, in percent.
pub(crate) const DEFAULT_REGRESSION_THRESHOLD: f64 = 10.0;
