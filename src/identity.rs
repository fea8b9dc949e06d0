//! Process identity: what was this pid invoked as?
//!
//! Reads `/proc/<pid>/cmdline`, which is a NUL-delimited record, not a text
//! file. The pid may already be dead by the time we look (short-lived
//! children routinely are), so existence of `/proc/<pid>/oom_score_adj` is
//! probed first as a liveness check; a vanished pid is a normal outcome, not
//! an error.

use std::path::PathBuf;

use nix::unistd::Pid;

/// Path to a pid's writable OOM score attribute.
pub fn oom_score_path(pid: Pid) -> PathBuf {
    PathBuf::from(format!("/proc/{}/oom_score_adj", pid))
}

fn cmdline_path(pid: Pid) -> PathBuf {
    PathBuf::from(format!("/proc/{}/cmdline", pid))
}

/// The tokens a process was invoked with, in original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    tokens: Vec<String>,
}

impl ProcessIdentity {
    /// Build an identity from raw `cmdline` bytes. Arguments are separated
    /// by NUL bytes; each argument is additionally split on whitespace so a
    /// record like `sh -c "id; w"` yields every flag and word as a token.
    pub fn from_cmdline(bytes: &[u8]) -> Self {
        let tokens = bytes
            .split(|&b| b == 0)
            .filter(|record| !record.is_empty())
            .flat_map(|record| {
                String::from_utf8_lossy(record)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        Self { tokens }
    }

    /// The command token with any leading directory path stripped.
    pub fn basename(&self) -> Option<&str> {
        let first = self.tokens.first()?;
        Some(match first.rfind('/') {
            Some(pos) => &first[pos + 1..],
            None => first,
        })
    }

    /// The tokens to evaluate against the whitelist. For a path-invoked
    /// command (`/usr/sbin/sshd -D`) that is the basename plus every
    /// following token; for a bare command it is the command token alone.
    pub fn candidates(&self) -> Vec<&str> {
        let Some(first) = self.tokens.first() else {
            return Vec::new();
        };
        if first.starts_with('/') {
            let mut out = Vec::with_capacity(self.tokens.len());
            match self.basename() {
                // A command ending in '/' has an empty basename, and an
                // empty candidate would substring-match every entry.
                Some(base) if !base.is_empty() => out.push(base),
                _ => {}
            }
            out.extend(self.tokens[1..].iter().map(String::as_str));
            out
        } else {
            vec![first.as_str()]
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// Read the identity of a live pid. `None` means the process is already
/// gone (or vanished mid-read), which the caller treats as "nothing to do".
pub fn read_identity(pid: Pid) -> Option<ProcessIdentity> {
    // Probe the score attribute first: if it is gone there is nothing we
    // could write to later either.
    if !oom_score_path(pid).exists() {
        return None;
    }
    let cmdline = cmdline_path(pid);
    if !cmdline.exists() {
        return None;
    }
    match std::fs::read(&cmdline) {
        Ok(bytes) => Some(ProcessIdentity::from_cmdline(&bytes)),
        Err(err) => {
            // Lost the race between probe and read.
            tracing::debug!(pid = pid.as_raw(), %err, "cmdline vanished mid-read");
            None
        }
    }
}
