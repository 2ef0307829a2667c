//! Logging setup.
//!
//! The library only emits `tracing` events. Binaries and tests that want to
//! see them call [`init_logging`] once at startup.

use tracing::Level;

use crate::error::{ProbeError, Result};

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level for everything outside this crate.
    pub level: Level,
    /// Level for `dataprobe` itself.
    pub crate_level: Level,
    /// Emit JSON lines instead of human-readable output.
    pub json_format: bool,
    /// Explicit filter directive. Overrides both levels.
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            crate_level: Level::INFO,
            json_format: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Verbose, human-readable output.
    pub fn development() -> Self {
        Self {
            level: Level::INFO,
            crate_level: Level::DEBUG,
            ..Self::default()
        }
    }

    /// JSON output for log collectors.
    pub fn structured() -> Self {
        Self {
            json_format: true,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_crate_level(mut self, level: Level) -> Self {
        self.crate_level = level;
        self
    }

    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Build the filter directive string.
    pub fn env_filter(&self) -> String {
        match &self.env_filter {
            Some(filter) => filter.clone(),
            None => format!(
                "{},dataprobe={}",
                self.level.as_str().to_lowercase(),
                self.crate_level.as_str().to_lowercase()
            ),
        }
    }
}

/// Install a global subscriber. `RUST_LOG` takes precedence when set.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

    let fmt_layer = if config.json_format {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ProbeError::Config(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_string() {
        assert_eq!(LoggingConfig::default().env_filter(), "warn,dataprobe=info");
        assert_eq!(
            LoggingConfig::development().env_filter(),
            "info,dataprobe=debug"
        );
        let custom = LoggingConfig::default().with_env_filter("dataprobe=trace");
        assert_eq!(custom.env_filter(), "dataprobe=trace");
    }

    #[test]
    fn test_structured_is_json() {
        assert!(LoggingConfig::structured().json_format);
        assert!(!LoggingConfig::default().with_json_format(false).json_format);
    }

    #[test]
    fn test_init_only_once() {
        assert!(init_logging(LoggingConfig::default()).is_ok());
        assert!(matches!(
            init_logging(LoggingConfig::structured()),
            Err(ProbeError::Config(_))
        ));
    }
}
