//! Logging configuration for db-parity.
//!
//! Reports go to stdout (or a file), so diagnostics always go to stderr.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Initializes logging to stderr.
///
/// `verbose` lowers the default level to `debug`, which includes the text of
/// every statement and every warehouse row.
pub fn init_stderr_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the env filter, preferring `RUST_LOG` when it is set.
fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_does_not_panic() {
        let _ = build_filter(false);
        let _ = build_filter(true);
    }
}
