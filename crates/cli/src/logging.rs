use tracing_subscriber::EnvFilter;

/// Install the log subscriber. Logs go to stderr so JSON on stdout stays
/// parseable.
///
/// `RUST_LOG` always wins when set. Otherwise `--verbose` selects `debug`
/// and the default is `warn`.
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
