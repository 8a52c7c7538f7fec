use tracing_subscriber::EnvFilter;

/// Diagnostics go to stderr so status lines on stdout stay clean.
/// `RUST_LOG` wins over `-v`.
pub fn init(verbose: bool) {
    let default = if verbose { "rev_tun=debug" } else { "rev_tun=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
