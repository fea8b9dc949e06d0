//! Classification pipeline: identity → whitelist → score
//!
//! Runs once per observed process creation. Every path through it
//! terminates without error: a vanished process, a missing whitelist and an
//! unwritable score attribute are all ordinary outcomes. Nothing here may
//! ever disturb the supervised program.

use std::path::PathBuf;

use nix::unistd::Pid;

use crate::events::{EventSink, PipelineEvent};
use crate::identity;
use crate::score::{self, WriteOutcome};
use crate::whitelist::{Classification, Whitelist};

/// The seam between the interception mechanism and the pipeline: one call
/// per process the supervised tree creates. Implementations are infallible
/// at this interface.
pub trait ProcessCreated {
    fn process_created(&self, pid: Pid);
}

/// The classification pipeline. Stateless across invocations apart from the
/// whitelist path; the whitelist itself is re-read on every call so operator
/// edits apply immediately.
pub struct Pipeline<S: EventSink> {
    whitelist_path: PathBuf,
    sink: S,
}

impl<S: EventSink> Pipeline<S> {
    pub fn new(whitelist_path: impl Into<PathBuf>, sink: S) -> Self {
        Self {
            whitelist_path: whitelist_path.into(),
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Classify one pid and write its score. Returns the classification,
    /// or `None` if the process was gone before it could be read.
    pub fn classify(&self, pid: Pid) -> Option<Classification> {
        let raw = pid.as_raw();
        self.sink.record(&PipelineEvent::Intercepted { pid: raw });

        let Some(identity) = identity::read_identity(pid) else {
            // Came and went before we could look; it needed no help.
            self.sink.record(&PipelineEvent::Vanished { pid: raw });
            return None;
        };

        let whitelist = Whitelist::load(&self.whitelist_path);
        for rejected in whitelist.rejected() {
            self.sink.record(&PipelineEvent::entry_rejected(rejected));
        }

        let candidates = identity.candidates();
        let hit = whitelist.match_any(candidates.iter().copied());
        let classification = match hit {
            Some((entry, candidate)) => {
                self.sink.record(&PipelineEvent::Checked {
                    pid: raw,
                    candidate: candidate.to_string(),
                    exempt: true,
                    matched_pattern: Some(entry.pattern.clone()),
                });
                Classification::Exempt
            }
            None => {
                for candidate in &candidates {
                    self.sink.record(&PipelineEvent::Checked {
                        pid: raw,
                        candidate: candidate.to_string(),
                        exempt: false,
                        matched_pattern: None,
                    });
                }
                Classification::Standard
            }
        };

        match score::write_score(pid, classification) {
            WriteOutcome::Written(written) => {
                self.sink.record(&PipelineEvent::ScoreWritten { pid: raw, score: written });
            }
            WriteOutcome::Skipped => {
                self.sink.record(&PipelineEvent::WriteSkipped {
                    pid: raw,
                    score: classification.score(),
                });
            }
            WriteOutcome::Vanished => {
                self.sink.record(&PipelineEvent::Vanished { pid: raw });
            }
        }
        Some(classification)
    }
}

impl<S: EventSink> ProcessCreated for Pipeline<S> {
    fn process_created(&self, pid: Pid) {
        tracing::debug!(pid = pid.as_raw(), "process created");
        self.classify(pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;

    #[test]
    fn test_vanished_pid_is_terminal_and_quiet() {
        let pipeline = Pipeline::new("/nonexistent/oom_whitelist", MemorySink::new());
        let gone = Pid::from_raw(i32::MAX);
        assert_eq!(pipeline.classify(gone), None);
        assert_eq!(
            pipeline.sink().events(),
            vec![
                PipelineEvent::Intercepted { pid: i32::MAX },
                PipelineEvent::Vanished { pid: i32::MAX },
            ]
        );
    }

    #[test]
    #[serial_test::serial]
    fn test_missing_whitelist_classifies_standard() {
        let pipeline = Pipeline::new("/nonexistent/oom_whitelist", MemorySink::new());
        let mut child = std::process::Command::new("sleep")
            .arg("5")
            .spawn()
            .expect("spawn sleep");
        let class = pipeline.classify(Pid::from_raw(child.id() as i32));
        assert_eq!(class, Some(Classification::Standard));
        child.kill().ok();
        child.wait().ok();
    }
}
