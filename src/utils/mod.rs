//! Utilities module for logging and error handling

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{ClassifierError, Result};
pub use logging::{init_logging, LogConfig};

/// Format a duration given in milliseconds for log output
pub fn format_millis(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{:.2} ms", ms)
    } else {
        format!("{:.2} s", ms / 1000.0)
    }
}
