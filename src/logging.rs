/// Structured logging for the flood monitoring dashboard.
///
/// Thin layer over `tracing`: every event carries the data source it
/// concerns and, where relevant, the geographic scope. Fetch failures are
/// classified before logging so expected outcomes (an unauthorized apply, an
/// endpoint missing in dev fixtures) stay quiet while service degradation is
/// logged as an error.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tfmt, EnvFilter, Registry};

use crate::fence::RequestToken;
use crate::model::{DataKind, FetchError, Scope};
use crate::refresh::RefreshOutcome;
use crate::scope::{AttemptOutcome, ScopeAttempt};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }

    pub fn parse(raw: &str) -> Option<LogLevel> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Log Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Sensors,
    Alerts,
    Map,
    Trends,
    Api,
    System,
}

impl From<DataKind> for LogSource {
    fn from(kind: DataKind) -> Self {
        match kind {
            DataKind::Sensors => LogSource::Sensors,
            DataKind::Alerts => LogSource::Alerts,
            DataKind::Map => LogSource::Map,
            DataKind::Trends => LogSource::Trends,
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Sensors => write!(f, "SENSORS"),
            LogSource::Alerts => write!(f, "ALERTS"),
            LogSource::Map => write!(f, "MAP"),
            LogSource::Trends => write!(f, "TRENDS"),
            LogSource::Api => write!(f, "API"),
            LogSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure: the session lacks permission for the call
    Expected,
    /// Unexpected failure: service degradation or a payload format change
    Unexpected,
    /// Unknown: cannot tell whether the failure is expected
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a read-API failure.
///
/// 401/403 are expected for anonymous sessions. 5xx, transport and parse
/// failures point at the service or a payload change. Anything else (404
/// from a scope with no endpoint data, other 4xx) is unknown.
pub fn classify_fetch_failure(err: &FetchError) -> FailureType {
    match err {
        e if e.is_auth_rejection() => FailureType::Expected,
        FetchError::Http(code) if *code >= 500 => FailureType::Unexpected,
        FetchError::Http(_) => FailureType::Unknown,
        FetchError::Transport(_) | FetchError::Parse(_) => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log file {path}: {reason}")]
    File { path: String, reason: String },
    #[error("a global logger is already installed")]
    AlreadyInitialized,
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `min_level` when set. With `log_file`, events are
/// also appended (no ANSI) to that file through a non-blocking writer; keep
/// the returned guard alive for the lifetime of the process or buffered
/// lines are lost.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&Path>,
    console_timestamps: bool,
) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = EnvFilter::builder()
        .with_default_directive(min_level.filter().into())
        .from_env_lossy();

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let appender = open_appender(path)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tfmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let (timed, untimed) = if console_timestamps {
        (Some(tfmt::layer().with_target(false)), None)
    } else {
        (None, Some(tfmt::layer().with_target(false).without_time()))
    };

    Registry::default()
        .with(filter)
        .with(timed)
        .with(untimed)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(guard)
}

fn open_appender(path: &Path) -> Result<RollingFileAppender, LoggingError> {
    let err = |reason: String| LoggingError::File {
        path: path.display().to_string(),
        reason,
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| err("no file name".to_string()))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| err(e.to_string()))
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

macro_rules! emit {
    ($level:expr, $source:expr, $scope:expr, $message:expr) => {
        match $scope {
            Some(scope) => {
                tracing::event!($level, source = %$source, scope = %scope, "{}", $message)
            }
            None => tracing::event!($level, source = %$source, "{}", $message),
        }
    };
}

/// Log a general informational message
pub fn info(source: LogSource, scope: Option<&Scope>, message: &str) {
    emit!(Level::INFO, source, scope, message);
}

/// Log a warning message
pub fn warn(source: LogSource, scope: Option<&Scope>, message: &str) {
    emit!(Level::WARN, source, scope, message);
}

/// Log an error message
pub fn error(source: LogSource, scope: Option<&Scope>, message: &str) {
    emit!(Level::ERROR, source, scope, message);
}

/// Log a debug message
pub fn debug(source: LogSource, scope: Option<&Scope>, message: &str) {
    emit!(Level::DEBUG, source, scope, message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a fetch failure at the level its classification implies
pub fn log_fetch_failure(source: LogSource, scope: Scope, operation: &str, err: &FetchError) {
    let failure_type = classify_fetch_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(source, Some(&scope), &message),
        FailureType::Unexpected => error(source, Some(&scope), &message),
        FailureType::Unknown => warn(source, Some(&scope), &message),
    }
}

/// Log how a fallback walk ended: info when the requested scope answered,
/// warn when a broader scope had to be used or nothing was found, error
/// when every scope failed.
pub fn log_resolution_summary(kind: DataKind, requested: Scope, attempts: &[ScopeAttempt]) {
    let source = LogSource::from(kind);
    let failed = attempts
        .iter()
        .filter(|a| matches!(a.outcome, AttemptOutcome::Failed(_)))
        .count();
    let accepted = attempts
        .iter()
        .find(|a| a.outcome == AttemptOutcome::Accepted)
        .map(|a| a.scope);

    for attempt in attempts {
        if let AttemptOutcome::Failed(err) = &attempt.outcome {
            log_fetch_failure(source, attempt.scope, &format!("{} fetch", kind), err);
        }
    }

    match accepted {
        Some(used) if used == requested => {
            debug(source, Some(&requested), "data found in requested scope")
        }
        Some(used) => warn(
            source,
            Some(&requested),
            &format!("no data in requested scope, showing {}", used),
        ),
        None if !attempts.is_empty() && failed == attempts.len() => error(
            source,
            Some(&requested),
            &format!("all {} scopes failed", attempts.len()),
        ),
        None => warn(
            source,
            Some(&requested),
            &format!(
                "no data across {} scopes ({} failed)",
                attempts.len(),
                failed
            ),
        ),
    }
}

/// Log the end of one refresh of `kind`.
pub fn log_transition(kind: DataKind, token: RequestToken, scope: Scope, outcome: RefreshOutcome) {
    match outcome {
        RefreshOutcome::Failed => tracing::warn!(
            kind = %kind, token = token.value(), scope = %scope, outcome = ?outcome,
            "refresh failed, view marked unavailable"
        ),
        RefreshOutcome::StaleDiscarded | RefreshOutcome::Skipped => tracing::debug!(
            kind = %kind, token = token.value(), scope = %scope, outcome = ?outcome,
            "refresh result not applied"
        ),
        RefreshOutcome::Committed | RefreshOutcome::CommittedEmpty => tracing::info!(
            kind = %kind, token = token.value(), scope = %scope, outcome = ?outcome,
            "refresh committed"
        ),
    }
}
