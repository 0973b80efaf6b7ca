//! tracing-subscriber setup for the binary.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies, raised
//! to `debug` by `--verbose`. Events go to stderr so stdout stays clean for
//! JSON output.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn build_env_filter(level: &str, verbose: bool) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = if verbose { "debug" } else { level };
    EnvFilter::try_new(level)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", level, e))
}

pub fn init(level: &str, verbose: bool) -> Result<()> {
    let filter = build_env_filter(level, verbose)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
