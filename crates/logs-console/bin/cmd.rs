pub mod console;
pub mod serve;
pub mod tail;

use eyre::{Result, WrapErr};
use logs_console::{
    Dialect, HttpFetcher, Poller, PollerConfig, RenderTarget, SharedTarget,
};
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn verbosity_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(verbosity_level(verbosity).into())
        .from_env_lossy()
}

/// Logs to stderr. `RUST_LOG` overrides the level picked by `verbosity`.
pub(crate) fn init_tracing(verbosity: u8) {
    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

/// Logs to `path`, leaving the terminal to the console UI.
pub(crate) fn init_file_tracing(path: &Path, verbosity: u8) -> Result<()> {
    let file = File::create(path)
        .wrap_err_with(|| format!("Failed to create log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .init();
    Ok(())
}

/// Poller settings shared by the `console` and `tail` subcommands.
pub(crate) fn poller_config(
    interval: Option<u64>,
    dialect: Dialect,
    limit: Option<usize>,
) -> PollerConfig {
    let config = PollerConfig::from_env().dialect(dialect).limit(limit);
    match interval {
        Some(secs) => config.interval(Duration::from_secs(secs)),
        None => config,
    }
}

pub(crate) fn http_poller(url: &str, config: PollerConfig) -> Arc<Poller<HttpFetcher>> {
    let fetcher = HttpFetcher::from_config(url, &config);
    let target: SharedTarget = RenderTarget::shared();
    Arc::new(Poller::new(fetcher, config, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_level_mapping() {
        assert_eq!(verbosity_level(0), Level::WARN);
        assert_eq!(verbosity_level(1), Level::INFO);
        assert_eq!(verbosity_level(2), Level::DEBUG);
        assert_eq!(verbosity_level(3), Level::TRACE);
        assert_eq!(verbosity_level(9), Level::TRACE);
    }

    #[test]
    fn test_interval_flag_overrides_env() {
        let config = poller_config(Some(2), Dialect::DoneFlag, Some(50));
        assert_eq!(config.interval, Duration::from_secs(2));
        assert_eq!(config.dialect, Dialect::DoneFlag);
        assert_eq!(config.limit, Some(50));
    }
}
