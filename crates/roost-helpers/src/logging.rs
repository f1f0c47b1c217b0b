use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// The filter is taken from `env_key` if set, then `RUST_LOG`, then the
/// supplied default.
pub fn init_logging(
    default_filter: &str,
    env_key: &str,
) {
    let filter = EnvFilter::try_from_env(env_key)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
