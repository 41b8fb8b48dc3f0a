//! Rolling file logs for StudyLevel core.
//!
//! # Responsibility
//! - Turn a host `CoreConfig` into validated `LogSettings`.
//! - Start the process-wide file logger once for those settings.
//! - Capture panics as `event=panic_captured` lines with user text redacted.
//!
//! # Invariants
//! - A config without `log_dir` leaves logging off.
//! - Repeating init with identical settings is a no-op; any other settings
//!   are refused once a logger runs.
//! - Panic lines never carry quoted values or text after a `: ` separator;
//!   those are where task descriptions and participant ids appear.

use crate::config::CoreConfig;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "studylevel";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_LINE_CHARS: usize = 120;
const REDACTED: &str = "<redacted>";

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Log verbosity accepted from hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Case-insensitive; `warning` is accepted for `warn`.
    pub fn parse(raw: &str) -> Result<Self, LoggingError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(LoggingError::UnknownLevel(other.to_string())),
        }
    }
}

/// Errors from logging setup.
#[derive(Debug)]
pub enum LoggingError {
    UnknownLevel(String),
    EmptyDir,
    RelativeDir(PathBuf),
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    LevelConflict {
        active: LogLevel,
        requested: LogLevel,
    },
    DirConflict {
        active: PathBuf,
        requested: PathBuf,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::EmptyDir => write!(f, "log_dir cannot be empty"),
            Self::RelativeDir(dir) => {
                write!(f, "log_dir must be an absolute path, got `{}`", dir.display())
            }
            Self::CreateDir { dir, source } => write!(
                f,
                "failed to create log directory `{}`: {source}",
                dir.display()
            ),
            Self::Backend(err) => write!(f, "failed to start logger: {err}"),
            Self::LevelConflict { active, requested } => write!(
                f,
                "logging already initialized with level `{}`; refusing to switch to `{}`",
                active.as_str(),
                requested.as_str()
            ),
            Self::DirConflict { active, requested } => write!(
                f,
                "logging already initialized at `{}`; refusing to switch to `{}`",
                active.display(),
                requested.display()
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FlexiLoggerError> for LoggingError {
    fn from(value: FlexiLoggerError) -> Self {
        Self::Backend(value)
    }
}

/// Validated logger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub dir: PathBuf,
}

impl LogSettings {
    /// Validates a level name and an absolute directory.
    pub fn new(level: &str, dir: &Path) -> Result<Self, LoggingError> {
        let level = LogLevel::parse(level)?;
        if dir.as_os_str().is_empty() {
            return Err(LoggingError::EmptyDir);
        }
        if !dir.is_absolute() {
            return Err(LoggingError::RelativeDir(dir.to_path_buf()));
        }
        Ok(Self {
            level,
            dir: dir.to_path_buf(),
        })
    }

    /// `None` when the config carries no `log_dir`.
    pub fn from_config(config: &CoreConfig) -> Result<Option<Self>, LoggingError> {
        config
            .log_dir
            .as_deref()
            .map(|dir| Self::new(&config.log_level, dir))
            .transpose()
    }

    fn ensure_matches(&self, requested: &LogSettings) -> Result<(), LoggingError> {
        if self.dir != requested.dir {
            return Err(LoggingError::DirConflict {
                active: self.dir.clone(),
                requested: requested.dir.clone(),
            });
        }
        if self.level != requested.level {
            return Err(LoggingError::LevelConflict {
                active: self.level,
                requested: requested.level,
            });
        }
        Ok(())
    }
}

/// Starts file logging from host config.
///
/// Returns `Ok(false)` without touching the logger when `log_dir` is unset,
/// `Ok(true)` once a logger with these settings is running.
pub fn init_logging(config: &CoreConfig) -> Result<bool, LoggingError> {
    let Some(settings) = LogSettings::from_config(config)? else {
        return Ok(false);
    };
    start_logger(&settings)?;
    info!(
        "event=core_init module=core status=ok level={} log_dir={} db_path={}",
        settings.level.as_str(),
        settings.dir.display(),
        config.db_path.display()
    );
    Ok(true)
}

/// Settings of the running logger, or `None` before init.
pub fn logging_status() -> Option<&'static LogSettings> {
    ACTIVE_LOGGER.get().map(|active| &active.settings)
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        LogLevel::Debug.as_str()
    } else {
        LogLevel::Info.as_str()
    }
}

fn start_logger(settings: &LogSettings) -> Result<(), LoggingError> {
    if let Some(active) = ACTIVE_LOGGER.get() {
        return active.settings.ensure_matches(settings);
    }

    let active = ACTIVE_LOGGER.get_or_try_init(|| -> Result<ActiveLogger, LoggingError> {
        std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDir {
            dir: settings.dir.clone(),
            source,
        })?;

        let handle = Logger::try_with_str(settings.level.as_str())?
            .log_to_file(
                FileSpec::default()
                    .directory(settings.dir.as_path())
                    .basename(LOG_FILE_BASENAME),
            )
            .rotate(
                Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(MAX_LOG_FILES),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .append()
            .format_for_files(flexi_logger::detailed_format)
            .start()?;

        install_panic_hook_once();
        info!(
            "event=app_start module=core status=ok platform={} debug_build={} version={}",
            std::env::consts::OS,
            cfg!(debug_assertions),
            env!("CARGO_PKG_VERSION")
        );

        Ok(ActiveLogger {
            settings: settings.clone(),
            _handle: handle,
        })
    })?;

    // Another thread may have won the init race with different settings.
    active.settings.ensure_matches(settings)
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned());
        let summary = match payload {
            Some(message) => redact_panic_message(&message),
            None => "non-string payload".to_string(),
        };
        error!(
            "event=panic_captured module=core status=error location={location} message={summary}"
        );
        previous_hook(panic_info);
    }));
}

/// One-line panic summary safe for log files.
///
/// Quoted spans (backticks, double quotes) and everything after the first
/// `: ` become `<redacted>`; the result is capped at `MAX_PANIC_LINE_CHARS`.
fn redact_panic_message(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    let (head, had_tail) = match first_line.split_once(": ") {
        Some((head, _)) => (head, true),
        None => (first_line, false),
    };

    let mut redacted = String::with_capacity(head.len());
    let mut open_quote: Option<char> = None;
    for ch in head.chars() {
        match open_quote {
            Some(quote) if ch == quote => {
                redacted.push_str(REDACTED);
                redacted.push(ch);
                open_quote = None;
            }
            Some(_) => {}
            None => {
                redacted.push(ch);
                if ch == '`' || ch == '"' {
                    open_quote = Some(ch);
                }
            }
        }
    }
    if open_quote.is_some() {
        redacted.push_str(REDACTED);
    }
    if had_tail {
        redacted.push_str(": ");
        redacted.push_str(REDACTED);
    }
    if message.lines().nth(1).is_some() {
        redacted.push_str(" (+more lines)");
    }

    if redacted.chars().count() > MAX_PANIC_LINE_CHARS {
        let mut capped = redacted
            .chars()
            .take(MAX_PANIC_LINE_CHARS)
            .collect::<String>();
        capped.push_str("...");
        return capped;
    }
    redacted
}
