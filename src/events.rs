//! Structured event sink for classification diagnostics
//!
//! The pipeline reports what it did through a single injected sink instead
//! of writing to log files ad hoc. The file-backed sink appends one JSON
//! object per line; recording is best-effort and a failed write is dropped
//! rather than allowed to disturb classification.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::whitelist::{RejectReason, RejectedLine};

/// One diagnostic record from the classification pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A new process was observed and handed to the pipeline.
    Intercepted { pid: i32 },
    /// One candidate token was evaluated against the whitelist.
    Checked {
        pid: i32,
        candidate: String,
        exempt: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        matched_pattern: Option<String>,
    },
    /// The score was written to the process's `oom_score_adj`.
    ScoreWritten { pid: i32, score: i32 },
    /// The process is alive but its score attribute was not writable
    /// (typically an exempt write without CAP_SYS_RESOURCE).
    WriteSkipped { pid: i32, score: i32 },
    /// The process was gone before identity read or score write.
    Vanished { pid: i32 },
    /// A whitelist line was discarded during parsing.
    EntryRejected { line: usize, reason: String },
}

impl PipelineEvent {
    pub fn entry_rejected(rejected: &RejectedLine) -> Self {
        let reason = match rejected.reason {
            RejectReason::Overlong => "overlong",
            RejectReason::Unterminated => "unterminated",
        };
        PipelineEvent::EntryRejected {
            line: rejected.line,
            reason: reason.to_string(),
        }
    }
}

/// Where pipeline events go. Implementations must tolerate concurrent
/// recording from multiple supervised forks.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &PipelineEvent);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &PipelineEvent) {}
}

/// Appends one JSON object per event to a file.
#[derive(Debug)]
pub struct JsonlSink {
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open (or create) the event log in append mode.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl EventSink for JsonlSink {
    fn record(&self, event: &PipelineEvent) {
        let Ok(line) = serde_json::to_string(event) else {
            return;
        };
        if let Ok(mut file) = self.file.lock() {
            // A full line per record under the lock keeps concurrent
            // appends from interleaving.
            let _ = writeln!(file, "{line}");
        }
    }
}

/// Collects events in memory; the test substitute for the file sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().expect("sink lock").clone()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &PipelineEvent) {
        self.events.lock().expect("sink lock").push(event.clone());
    }
}
