//! Log file setup.
//!
//! Two append-only files are written into the log directory: `activity.log`
//! receives everything at the configured level and above, `errors.log` only
//! errors. Lines look like `2025-01-31 14:02:11 INFO: Moved: a.jpg → ...`.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{ChronoLocal, FormatTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

pub const ACTIVITY_LOG: &str = "activity.log";
pub const ERROR_LOG: &str = "errors.log";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Minimum level written to the activity log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("could not create log directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not open log file: {0}")]
    OpenFile(#[from] tracing_appender::rolling::InitError),

    #[error("a global logger is already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the background log writers alive; logs are flushed when dropped.
#[must_use = "dropping the guard stops log writing"]
pub struct LogGuard {
    _activity: WorkerGuard,
    _errors: WorkerGuard,
    dir: PathBuf,
}

impl LogGuard {
    /// The directory both log files are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Writes `{time} {LEVEL}: {message}`, one event per line.
struct LineFormat {
    timer: ChronoLocal,
}

impl LineFormat {
    fn new() -> Self {
        Self {
            timer: ChronoLocal::new(TIME_FORMAT.to_string()),
        }
    }
}

fn level_name(level: &Level) -> &'static str {
    if *level == Level::WARN {
        "WARNING"
    } else {
        level.as_str()
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        self.timer.format_time(&mut writer)?;
        write!(writer, " {}: ", level_name(event.metadata().level()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// The directory next to the running executable, or `./logs`.
pub fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

fn appender(dir: &Path, file_name: &str) -> Result<RollingFileAppender, LoggingError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)?;
    Ok(appender)
}

/// Builds the two-file subscriber without installing it.
fn subscriber(
    dir: &Path,
    level: LogLevel,
) -> Result<(impl Subscriber + Send + Sync + 'static, LogGuard), LoggingError> {
    fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let (activity_writer, activity_guard) =
        tracing_appender::non_blocking(appender(dir, ACTIVITY_LOG)?);
    let (error_writer, error_guard) = tracing_appender::non_blocking(appender(dir, ERROR_LOG)?);

    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(activity_writer)
                .with_ansi(false)
                .event_format(LineFormat::new())
                .with_filter(LevelFilter::from(level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(error_writer)
                .with_ansi(false)
                .event_format(LineFormat::new())
                .with_filter(LevelFilter::ERROR),
        );

    let guard = LogGuard {
        _activity: activity_guard,
        _errors: error_guard,
        dir: dir.to_path_buf(),
    };
    Ok((subscriber, guard))
}

/// Installs the global subscriber writing both log files into `dir`.
///
/// # Errors
///
/// Fails if the directory or files cannot be created, or if a global
/// subscriber was already installed in this process.
pub fn init(dir: &Path, level: LogLevel) -> Result<LogGuard, LoggingError> {
    let (subscriber, guard) = subscriber(dir, level)?;
    subscriber.try_init()?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::DEBUG);
        assert_eq!(LevelFilter::from(LogLevel::Warning), LevelFilter::WARN);
        assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
    }

    #[test]
    fn test_level_parses_from_settings() {
        #[derive(Deserialize)]
        struct Wrapper {
            level: LogLevel,
        }

        let parsed: Wrapper = toml::from_str(r#"level = "warn""#).unwrap();
        assert_eq!(parsed.level, LogLevel::Warning);

        let parsed: Wrapper = toml::from_str(r#"level = "debug""#).unwrap();
        assert_eq!(parsed.level, LogLevel::Debug);
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Splits a line into its timestamp and the rest, checking the timestamp.
    fn after_timestamp(line: &str) -> &str {
        let (stamp, rest) = line.split_at(TIME_FORMAT_LEN);
        assert!(
            chrono::NaiveDateTime::parse_from_str(stamp, TIME_FORMAT).is_ok(),
            "bad timestamp in {:?}",
            line
        );
        rest
    }

    const TIME_FORMAT_LEN: usize = "2025-01-31 14:02:11".len();

    #[test]
    fn test_log_files_use_the_line_format() {
        let temp = tempfile::TempDir::new().unwrap();
        let (subscriber, guard) = subscriber(temp.path(), LogLevel::Info).unwrap();
        assert_eq!(guard.dir(), temp.path());

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("Skipping protected entry venv");
            tracing::info!("Moved: a.jpg");
            tracing::warn!("File renamed due to collision: b.jpg → b_copy1.jpg");
            tracing::error!("ERROR Moving c.jpg: disk full");
        });
        drop(guard);

        let activity = read_lines(&temp.path().join(ACTIVITY_LOG));
        let bodies: Vec<_> = activity.iter().map(|l| after_timestamp(l)).collect();
        assert_eq!(
            bodies,
            vec![
                " INFO: Moved: a.jpg",
                " WARNING: File renamed due to collision: b.jpg → b_copy1.jpg",
                " ERROR: ERROR Moving c.jpg: disk full",
            ]
        );

        let errors = read_lines(&temp.path().join(ERROR_LOG));
        assert_eq!(errors.len(), 1);
        assert_eq!(after_timestamp(&errors[0]), " ERROR: ERROR Moving c.jpg: disk full");
    }

    #[test]
    fn test_error_level_keeps_activity_quiet() {
        let temp = tempfile::TempDir::new().unwrap();
        let (subscriber, guard) = subscriber(temp.path(), LogLevel::Error).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Moved: a.jpg");
            tracing::error!("Security ERROR: denied");
        });
        drop(guard);

        let activity = read_lines(&temp.path().join(ACTIVITY_LOG));
        assert_eq!(activity.len(), 1);
        assert!(activity[0].ends_with(" ERROR: Security ERROR: denied"));
    }

    #[test]
    fn test_default_log_dir_is_named_logs() {
        assert!(default_log_dir().ends_with("logs"));
    }
}
