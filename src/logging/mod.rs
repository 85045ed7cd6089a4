//! Logging setup and helpers
//!
//! Tracing subscriber initialization plus thin wrappers used throughout the
//! crate. Connection records are serialized to JSON and logged at debug level.

use crate::models::ConnectionRecord;
use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, trace, warn, LevelFilter};
use std::sync::Once;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Initialize the global logger
///
/// Uses the `RUST_LOG` environment variable when set, otherwise the level
/// given by the configuration. Safe to call more than once.
pub fn init_logger(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

        FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();

        // Bridge log events to tracing (after subscriber is set up)
        if let Err(e) = LogTracer::init() {
            eprintln!("Warning: Failed to initialize LogTracer: {:?}", e);
        }

        log::set_max_level(
            default_level
                .parse::<LevelFilter>()
                .unwrap_or(LevelFilter::Info),
        );
    });
}

/// Log a per-connection record as structured JSON
pub fn log_connection(record: &ConnectionRecord) -> Result<()> {
    let timestamp = Utc::now().to_rfc3339();
    let log_message = serde_json::to_string(record)?;
    debug!("[{}] CONNECTION: {}", timestamp, log_message);
    Ok(())
}

/// Log an error message
pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Log an info message
pub fn log_info(message: &str) {
    info!("{}", message);
}

/// Log a warning message
pub fn log_warning(message: &str) {
    warn!("{}", message);
}

/// Log a debug message
pub fn log_debug(message: &str) {
    debug!("{}", message);
}

/// Log a trace message
pub fn log_trace(message: &str) {
    trace!("{}", message);
}

/// Convenience macro for logging connection records
#[macro_export]
macro_rules! log_connection_record {
    ($record:expr) => {
        if let Err(e) = $crate::logging::log_connection($record) {
            eprintln!("Failed to log connection record: {}", e);
        }
    };
}

/// Convenience macro for logging errors
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error(&format!($($arg)*));
    };
}

/// Convenience macro for logging info messages
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info(&format!($($arg)*));
    };
}

/// Convenience macro for logging warning messages
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::logging::log_warning(&format!($($arg)*));
    };
}

/// Convenience macro for logging debug messages
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug(&format!($($arg)*));
    };
}
