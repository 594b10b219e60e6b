use anyhow::Result;
use chrono::Local;
use std::io::Write;
use tracing::info;

/// Receives human-readable status messages (start, parameters, results)
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Receives retained encoder diagnostics and batch progress lines
pub trait ProgressSink: Send + Sync {
    fn progress(&self, message: &str);
}

/// Forwards both streams to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        info!(target: "avcbatch::log", "{}", message);
    }
}

impl ProgressSink for TracingSink {
    fn progress(&self, message: &str) {
        info!(target: "avcbatch::progress", "{}", message);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _message: &str) {}
}

impl ProgressSink for NullSink {
    fn progress(&self, _message: &str) {}
}

/// Write debug log to avcbatch.log in current directory
/// Appends to file, creating it if needed
pub fn write_debug_log(message: &str) -> Result<()> {
    use std::fs::OpenOptions;

    let log_path = std::env::current_dir()?.join("avcbatch.log");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "[{}] {}", timestamp, message)?;
    Ok(())
}
