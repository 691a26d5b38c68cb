//! Logging infrastructure - structured tracing for pool and boundary events
//!
//! Design: Uses `tracing` throughout the crate with:
//! - `trace!` on the buffer hot path (zero-cost unless enabled)
//! - `debug!`/`info!` for pool and handle lifecycle
//! - `error!` right before a usage-error panic or abort
//!
//! Installing a subscriber is left to the embedding program; [`init`] is a
//! convenience for programs and tests that want one configured from the
//! environment.

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub use tracing::{debug, error, info, trace, warn, Level};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the non-blocking writer alive until [`shutdown`]
static WRITER_GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "bytepool.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is not set
    pub level: Level,
    /// JSON lines instead of compact text
    pub json_format: bool,
    /// Daily rolling files in this directory instead of stderr
    pub log_dir: Option<PathBuf>,
    /// Emit span enter/close events
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            log_dir: None,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // BYTEPOOL_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("BYTEPOOL_LOG_LEVEL") {
            config.level = parse_level(&level).unwrap_or(Level::INFO);
        }

        // BYTEPOOL_LOG_DIR: directory for rolling log files
        config.log_dir = std::env::var_os("BYTEPOOL_LOG_DIR").map(PathBuf::from);

        config.json_format = std::env::var("BYTEPOOL_LOG_JSON").is_ok();
        config.show_spans = std::env::var("BYTEPOOL_LOG_SPANS").is_ok();

        config
    }

    /// Verbose config for chasing pool misuse
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            show_spans: true,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_json(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
///
/// Only the first call installs a subscriber. If another global subscriber is
/// already set, this one is silently skipped.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("bytepool={}", config.level.as_str().to_lowercase()))
        });

        let (writer, guard) = match &config.log_dir {
            Some(dir) => {
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX))
            }
            None => tracing_appender::non_blocking(std::io::stderr()),
        };

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let base = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(cfg!(debug_assertions));

        let layer = if config.json_format {
            base.json().boxed()
        } else {
            base.compact().boxed()
        };

        if tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .is_ok()
        {
            *WRITER_GUARD.lock() = Some(guard);
        }
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

/// Flush buffered records; events logged afterwards are dropped
pub fn shutdown() {
    if let Some(guard) = WRITER_GUARD.lock().take() {
        drop(guard);
    }
}
