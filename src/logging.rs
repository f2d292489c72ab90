//! Failure reporting
//!
//! Boundary operations never return error details to C callers; the text
//! goes to a [`LogSink`] instead. The default sink forwards to `tracing`.

use crate::config::Config;
use parking_lot::Mutex;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Target used for every failure reported across the C boundary
pub const LOG_TARGET: &str = "libappimage";

/// Receives failure text from boundary operations
///
/// Shared by every thread calling into the library; implementations
/// serialize their own writes.
pub trait LogSink: Send + Sync {
    fn error(&self, operation: &str, message: &str);
}

/// Forwards failures to `tracing` under the `libappimage` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn error(&self, operation: &str, message: &str) {
        error!(target: LOG_TARGET, "at {} : {}", operation, message);
    }
}

/// Keeps failures in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn error(&self, operation: &str, message: &str) {
        self.lines
            .lock()
            .push(format!("at {} : {}", operation, message));
    }
}

/// Install a stderr `fmt` subscriber
///
/// Returns false when the filter is invalid or the host process already
/// installed a global subscriber; both leave the current setup untouched.
pub fn init_subscriber(config: &Config) -> bool {
    let filter = match EnvFilter::try_new(&config.log_filter) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("libappimage: invalid log filter {:?}: {}", config.log_filter, e);
            return false;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.log_ansi)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
