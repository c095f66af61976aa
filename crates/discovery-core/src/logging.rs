use anyhow::Result;
use discovery_config::LoggingConfig;
use std::io;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `config.level` and `RUST_LOG_JSON=true|false`
/// overrides `config.json`. Fails if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let json = json_output(config);
    let registry = Registry::default().with(filter);

    match &config.file {
        Some(log_path) => {
            let appender = rolling_appender(log_path)?;
            if json {
                let layer = fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(appender);
                registry.with(layer).try_init()?;
            } else {
                let layer = fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(appender);
                registry.with(layer).try_init()?;
            }
        }
        None => {
            if json {
                let layer = fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(io::stderr);
                registry.with(layer).try_init()?;
            } else {
                let layer = fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(io::stderr);
                registry.with(layer).try_init()?;
            }
        }
    }

    Ok(())
}

fn json_output(config: &LoggingConfig) -> bool {
    json_override(std::env::var("RUST_LOG_JSON").ok().as_deref(), config)
}

fn json_override(env_value: Option<&str>, config: &LoggingConfig) -> bool {
    match env_value {
        Some(value) => value == "true",
        None => config.json,
    }
}

/// Daily-rotated appender; `reelswipe.log` rotates to `reelswipe.<date>`
fn rolling_appender(log_path: &Path) -> Result<RollingFileAppender> {
    let log_dir = log_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Log file path has no parent directory"))?;
    std::fs::create_dir_all(log_dir)?;

    let log_filename = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid log filename"))?;
    let log_prefix = log_filename.rsplit_once('.').map_or(log_filename, |(stem, _)| stem);

    Ok(RollingFileAppender::new(Rotation::DAILY, log_dir, log_prefix))
}
