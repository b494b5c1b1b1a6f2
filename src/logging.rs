//! Console logging for the `sheetnest` binary.
//!
//! The library only emits `tracing` events; this module installs the
//! subscriber that prints them. `RUST_LOG` takes precedence over the level
//! chosen from the command line.
//!
//! ```no_run
//! sheetnest::logging::init(false).expect("Failed to initialize logging");
//! tracing::warn!("shown on stderr");
//! ```

use anyhow::Context as _;
use anyhow::Result;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is not set.
pub fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "warn"
    }
}

/// Installs a stderr subscriber; stdout stays reserved for conversion results.
pub fn init(verbose: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level(verbose)))
        .context("Failed to create env filter")?;

    let stderr_layer = fmt::layer()
        .with_target(verbose)
        .without_time()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_level() {
        assert_eq!(default_level(false), "warn");
        assert_eq!(default_level(true), "info");
    }
}
