use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Context;
use log::LevelFilter;

use crate::utils::to_absolute_path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevel(pub LevelFilter);
impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" | "warning" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" | "none" => LevelFilter::Off,
            _ => return Err(format!("Invalid log level: {}", s)),
        };
        Ok(LogLevel(level))
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        level.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogMode {
    Path,
    Terminal,
    Discard,
}
impl std::str::FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s.to_lowercase().as_str() {
            "path" | "file" => LogMode::Path,
            "terminal" | "term" | "cli" => LogMode::Terminal,
            "discard" | "none" => LogMode::Discard,
            _ => return Err(format!("Invalid log mode: {}", s)),
        };
        Ok(mode)
    }
}

/// Install the process-wide logger. Terminal output goes to stderr so that
/// stdout stays free for command output.
pub fn setup_global_logger(
    log_level: LogLevel,
    log_output: LogMode,
    log_path: &Path,
) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.format_timestamp_secs();

    match log_output {
        LogMode::Discard => {
            builder.filter_level(LevelFilter::Off);
        }

        LogMode::Terminal => {
            builder
                .filter_level(log_level.into())
                .target(env_logger::Target::Stderr);
        }

        LogMode::Path => {
            let path = to_absolute_path(log_path)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            builder
                .filter_level(log_level.into())
                .write_style(env_logger::WriteStyle::Never)
                .target(env_logger::Target::Pipe(Box::new(file)));
        }
    };

    builder
        .try_init()
        .context("Logger was already initialised")?;
    Ok(())
}
