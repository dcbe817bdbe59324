use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::InterceptdError;

/// Logging configuration for the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Whether to emit JSON formatted logs
    pub json_format: bool,

    /// Whether to enable colored output (only for non-JSON format)
    pub enable_colors: bool,

    /// Log file path (optional, if None logs only to stdout)
    pub log_file: Option<String>,

    /// Module-specific log levels
    pub module_levels: std::collections::HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = std::collections::HashMap::new();
        module_levels.insert("interceptd".to_string(), "info".to_string());
        module_levels.insert("intercept_core".to_string(), "info".to_string());
        module_levels.insert("sqlx".to_string(), "warn".to_string());
        module_levels.insert("tokio".to_string(), "warn".to_string());

        Self {
            level: "info".to_string(),
            json_format: false,
            enable_colors: true,
            log_file: None,
            module_levels,
        }
    }
}

/// Initialize logging based on the provided configuration
pub fn init_logging(config: &LoggingConfig) -> Result<(), InterceptdError> {
    let mut filter = EnvFilter::new(&config.level);
    for (module, level) in &config.module_levels {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| InterceptdError::Logging(format!("Invalid log directive: {}", e)))?,
        );
    }

    let registry = tracing_subscriber::registry().with(filter);

    let result = if let Some(log_file) = &config.log_file {
        let appender = create_file_appender(log_file)?;
        if config.json_format {
            registry
                .with(fmt::layer().json().with_writer(appender).with_ansi(false))
                .try_init()
        } else {
            registry
                .with(fmt::layer().with_writer(appender).with_ansi(false))
                .try_init()
        }
    } else if config.json_format {
        registry.with(fmt::layer().json().with_ansi(false)).try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_ansi(config.enable_colors))
            .try_init()
    };

    match result {
        Ok(_) => {
            tracing::info!("Logging initialized with config level: {}", config.level);
        }
        Err(_) => {
            // Logging already initialized, that's fine
            tracing::debug!("Logging already initialized, skipping");
        }
    }

    Ok(())
}

/// Create a daily-rotating file appender for the configured log path
fn create_file_appender(
    log_file: &str,
) -> Result<tracing_appender::rolling::RollingFileAppender, InterceptdError> {
    use std::path::Path;
    use tracing_appender::rolling::{RollingFileAppender, Rotation};

    let log_path = Path::new(log_file);
    let directory = log_path
        .parent()
        .ok_or_else(|| InterceptdError::Logging("Invalid log file path".to_string()))?;
    let filename = log_path
        .file_name()
        .ok_or_else(|| InterceptdError::Logging("Invalid log file name".to_string()))?
        .to_string_lossy();

    std::fs::create_dir_all(directory)
        .map_err(|e| InterceptdError::Logging(format!("Failed to create log directory: {}", e)))?;

    Ok(RollingFileAppender::new(
        Rotation::DAILY,
        directory,
        filename.as_ref(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json_format);
        assert!(config.enable_colors);
        assert!(config.log_file.is_none());
        assert!(!config.module_levels.is_empty());
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init_logging(&config).unwrap();
        // Second init hits the already-initialized path and still succeeds
        init_logging(&config).unwrap();
    }
}
