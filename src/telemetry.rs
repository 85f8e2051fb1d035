//! Telemetry utilities for command timing.

use std::time::Instant;
use tracing::debug;

/// Guard for timing command execution.
///
/// Logs command latency when dropped.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        debug!(
            command = %self.command,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            "Command execution finished"
        );
    }
}
