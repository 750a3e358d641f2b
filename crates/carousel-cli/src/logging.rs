//! Log setup

use tracing_subscriber::EnvFilter;

/// Default filter directive for a verbosity
#[must_use]
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "carousel=debug"
    } else {
        "carousel=info"
    }
}

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` wins over `verbose` when set. Calling twice is a no-op.
pub fn init(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}
