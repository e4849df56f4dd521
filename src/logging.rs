//! Logging setup.
//!
//! Console output is always on; with a log directory configured, the same
//! events also go to a daily rolling file (`<dir>/<prefix>.YYYY-MM-DD`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter directive, e.g. "info" or "rakumachi_scout=debug,sqlx=warn"
    pub level: String,
    pub format: LogFormat,
    pub log_dir: Option<PathBuf>,
    pub log_file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            log_dir: None,
            log_file_prefix: "scrape_daily".to_string(),
        }
    }
}

impl LogConfig {
    /// Reads `LOG_LEVEL`, `LOG_FORMAT` and `LOG_DIR`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(level) = lookup("LOG_LEVEL") {
            config.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.format = format.parse()?;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            config.log_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    fn filter(&self) -> Result<EnvFilter> {
        // RUST_LOG wins over the configured level when set.
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .with_context(|| format!("Invalid log filter: {}", self.level))
    }
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let console = match config.format {
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, &config.log_file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(config.filter()?)
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn invalid_format_in_environment_is_an_error() {
        let lookup = |key: &str| (key == "LOG_FORMAT").then(|| "xml".to_string());
        let err = LogConfig::from_lookup(lookup).unwrap_err();
        assert!(err.to_string().contains("xml"));

        let config = LogConfig::from_lookup(|key: &str| match key {
            "LOG_FORMAT" => Some("json".to_string()),
            "LOG_DIR" => Some("logs".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_dir, Some(PathBuf::from("logs")));
        assert_eq!(config.level, "info");
    }
}
