use std::io;

use anyhow::Result;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

use crate::config::LogSettings;

/// Resolved logging outputs
pub struct LogConfig {
    pub console_level: LevelFilter,
    pub file_level: LevelFilter,
    /// None means console only
    pub log_file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_level: LevelFilter::Info,
            file_level: LevelFilter::Debug,
            log_file: None,
        }
    }
}

impl From<&LogSettings> for LogConfig {
    fn from(settings: &LogSettings) -> Self {
        Self {
            console_level: parse_log_level(&settings.console_level),
            file_level: parse_log_level(&settings.file_level),
            log_file: settings.file.clone(),
        }
    }
}

/// Install the global logger. Fails if a logger is already installed.
pub fn init(config: LogConfig) -> Result<()> {
    dispatch(&config)?.apply()?;
    Ok(())
}

/// Builds the dispatcher without installing it. The console gets colored
/// levels; the log file gets the same line with plain level names.
pub fn dispatch(config: &LogConfig) -> Result<fern::Dispatch> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let console = fern::Dispatch::new()
        .level(config.console_level)
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                timestamp(),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .chain(io::stderr());

    // Statement logging from the pool drowns out the feed
    let mut root = fern::Dispatch::new()
        .level(LevelFilter::Trace)
        .level_for("sqlx", LevelFilter::Warn)
        .chain(console);

    if let Some(path) = &config.log_file {
        let file = fern::Dispatch::new()
            .level(config.file_level)
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{} [{}] [{}] {}",
                    timestamp(),
                    record.target(),
                    record.level(),
                    message
                ))
            })
            .chain(fern::log_file(path)?);
        root = root.chain(file);
    }

    Ok(root)
}

fn timestamp() -> impl std::fmt::Display {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
}

/// Unknown names fall back to `Info`.
pub fn parse_log_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_log_level(" warning "), LevelFilter::Warn);
        assert_eq!(parse_log_level("verbose"), LevelFilter::Info);
    }

    #[test]
    fn test_log_file_has_plain_levels() {
        let path = std::env::temp_dir().join(format!("daily-bite-logger-{}.log", std::process::id()));
        let config = LogConfig {
            console_level: LevelFilter::Off,
            file_level: LevelFilter::Debug,
            log_file: Some(path.to_string_lossy().into_owned()),
        };

        let (_, logger) = dispatch(&config).unwrap().into_log();
        logger.log(
            &log::Record::builder()
                .args(format_args!("seeded {} topics", 3))
                .level(log::Level::Info)
                .target("daily_bite::db")
                .build(),
        );
        logger.log(
            &log::Record::builder()
                .args(format_args!("select 1"))
                .level(log::Level::Debug)
                .target("sqlx::query")
                .build(),
        );
        logger.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(contents.contains("[daily_bite::db] [INFO] seeded 3 topics"));
        assert!(!contents.contains('\x1b'));
        assert!(!contents.contains("select 1"));
    }

    #[test]
    fn test_from_settings() {
        let settings = LogSettings {
            console_level: "error".to_string(),
            file_level: "trace".to_string(),
            file: Some("daily-bite.log".to_string()),
        };
        let config = LogConfig::from(&settings);
        assert_eq!(config.console_level, LevelFilter::Error);
        assert_eq!(config.file_level, LevelFilter::Trace);
        assert_eq!(config.log_file.as_deref(), Some("daily-bite.log"));
    }
}
