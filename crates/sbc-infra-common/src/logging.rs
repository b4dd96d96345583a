//! `tracing` subscriber setup, grounded on the teacher's
//! `infra-common::logging::setup` module.

use crate::config::LoggingConfig;
use crate::errors::{Error, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global `tracing` subscriber from a [`LoggingConfig`].
///
/// Honors `RUST_LOG` if set; otherwise falls back to `config.level` (default
/// `info`). Call once, at process start, before any other crate logs.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = config
        .level
        .as_deref()
        .map(parse_log_level)
        .transpose()?
        .unwrap_or(Level::INFO);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let builder = fmt::Subscriber::builder().with_env_filter(filter).with_target(true);

    let result = if let Some(path) = &config.file_path {
        let dir = std::path::Path::new(path)
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .ok_or_else(|| Error::Logging("logging.file_path has no file name".into()))?;
        let appender = tracing_appender::rolling::daily(dir, file_name);
        if config.json {
            builder.json().with_writer(appender).try_init()
        } else {
            builder.with_writer(appender).try_init()
        }
    } else if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| Error::Logging(e.to_string()))
}

fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::Logging(format!("invalid log level: {level}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert!(parse_log_level("not-a-level").is_err());
    }
}
