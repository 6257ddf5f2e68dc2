pub mod comments;
pub mod emit;
pub mod error;
pub mod imports;
pub mod rewrite;
pub mod scan;
pub mod setup;
pub mod toolexec;
pub mod tree;

/// Environment variable holding the tool's own log filter.
pub const LOG_ENV: &str = "TRACEMARK_LOG";

/// Install the tool's diagnostic subscriber: plain text on stderr, filtered
/// by `TRACEMARK_LOG` (default `warn`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
