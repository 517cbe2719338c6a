//! Structured session logging utilities.
//!
//! Provides consistent, structured logging for pipeline sessions with
//! contextual fields shared across lifecycle events.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with colored output for dev, JSON for production.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vpub=info".parse().unwrap_or_default());

    let result = if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()
    };
    if let Err(e) = result {
        tracing::debug!("Tracing already initialized: {}", e);
    }
}

/// Session logger for structured logging with consistent formatting.
///
/// Carries the video identity and operation type so lifecycle events share
/// contextual fields.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    identity: String,
    operation: String,
}

impl SessionLogger {
    /// Create a new session logger for a specific video and operation.
    pub fn new(identity: impl ToString, operation: &str) -> Self {
        Self {
            identity: identity.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of an operation.
    pub fn log_start(&self, message: &str) {
        info!(
            identity = %self.identity,
            operation = %self.operation,
            "Session started: {}", message
        );
    }

    /// Log a progress update.
    pub fn log_progress(&self, message: &str) {
        info!(
            identity = %self.identity,
            operation = %self.operation,
            "Session progress: {}", message
        );
    }

    /// Log an error.
    pub fn log_error(&self, message: &str) {
        error!(
            identity = %self.identity,
            operation = %self.operation,
            "Session error: {}", message
        );
    }

    /// Log the completion of an operation.
    pub fn log_completion(&self, message: &str) {
        info!(
            identity = %self.identity,
            operation = %self.operation,
            "Session completed: {}", message
        );
    }

    /// Get the identity string.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Get the operation type.
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_logger_creation() {
        let logger = SessionLogger::new("mem-0001", "migration");
        assert_eq!(logger.identity(), "mem-0001");
        assert_eq!(logger.operation(), "migration");
    }
}
