//! Best-effort writer for `/proc/<pid>/oom_score_adj`.

use std::io::Write;

use nix::unistd::Pid;

use crate::identity::oom_score_path;
use crate::whitelist::Classification;

/// Outcome of a score write. `Vanished` and `Skipped` are both quiet
/// non-errors for the caller; they differ only in what the diagnostic
/// record says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The score was written.
    Written(i32),
    /// The process was gone before or during the write.
    Vanished,
    /// The process is alive but the attribute was not writable; lowering
    /// below the current value needs CAP_SYS_RESOURCE.
    Skipped,
}

/// Write the classification's score to the pid's `oom_score_adj`.
///
/// Strictly best-effort: a dead target needed no help, and an unwritable
/// attribute leaves the kernel default in place. Neither is an error for
/// the caller.
pub fn write_score(pid: Pid, classification: Classification) -> WriteOutcome {
    let score = classification.score();
    let path = oom_score_path(pid);
    if !path.exists() {
        return WriteOutcome::Vanished;
    }
    let mut file = match std::fs::OpenOptions::new().write(true).open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return WriteOutcome::Vanished;
        }
        Err(err) => {
            tracing::debug!(pid = pid.as_raw(), %err, "oom_score_adj not writable");
            return WriteOutcome::Skipped;
        }
    };
    match writeln!(file, "{score}") {
        Ok(()) => WriteOutcome::Written(score),
        Err(err) if err.raw_os_error() == Some(libc::ESRCH) => WriteOutcome::Vanished,
        Err(err) => {
            tracing::debug!(pid = pid.as_raw(), score, %err, "oom_score_adj write failed");
            WriteOutcome::Skipped
        }
    }
}
