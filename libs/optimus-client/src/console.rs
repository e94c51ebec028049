// Console/IO buffer for one run slot
// Presentation state only; never persisted

use optimus_common::types::RunResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleBuffer {
    pub stdin: String,
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u64,
    pub status: Option<String>,
    pub success: Option<bool>,
    /// Sequence number of the run whose output is shown.
    pub seq: u64,
}

impl ConsoleBuffer {
    /// Clear previous output and show a run in progress.
    pub fn begin(&mut self, seq: u64, stdin: &str) {
        *self = ConsoleBuffer {
            stdin: stdin.to_string(),
            seq,
            ..ConsoleBuffer::default()
        };
    }

    /// Show a result. Ignored unless it belongs to the run that last began.
    pub fn apply(&mut self, seq: u64, result: &RunResult) -> bool {
        if seq != self.seq {
            return false;
        }
        self.stdout = result.stdout.clone();
        self.stderr = result.stderr.clone().unwrap_or_default();
        self.execution_time_ms = result.execution_time_ms;
        self.status = Some(result.status.clone());
        self.success = Some(result.success);
        true
    }

    pub fn clear(&mut self) {
        *self = ConsoleBuffer::default();
    }

    pub fn is_waiting(&self) -> bool {
        self.seq != 0 && self.success.is_none()
    }
}
