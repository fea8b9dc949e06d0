//! Exemption whitelist: loading, parsing and matching
//!
//! One pattern per line in `/etc/oom_whitelist`. Plain lines substring-match
//! (the configured pattern must *contain* the candidate, so an entry `sshd`
//! also exempts `sh`); `!`-prefixed lines must match exactly. `#` lines and
//! blank lines are ignored. The file is re-read on every classification so
//! operator edits take effect without restarting the supervised agent.

use std::path::Path;

/// Default location of the operator-maintained whitelist.
pub const DEFAULT_WHITELIST_PATH: &str = "/etc/oom_whitelist";

/// Longest accepted whitelist line, in bytes, excluding the newline.
/// Anything longer is rejected rather than silently truncated.
pub const MAX_ENTRY_LEN: usize = 512;

/// How a whitelist entry is compared against a candidate token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Candidate must equal the pattern byte-for-byte (`!sshd`).
    Exact,
    /// Pattern must contain the candidate as a contiguous substring (`sshd`).
    Substring,
}

/// A single parsed whitelist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExemptionEntry {
    pub pattern: String,
    pub mode: MatchMode,
    /// 1-based line number in the whitelist file.
    pub line: usize,
}

impl ExemptionEntry {
    /// Check one candidate token against this entry. An empty candidate
    /// never matches; every pattern contains the empty string.
    pub fn matches(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        match self.mode {
            MatchMode::Exact => self.pattern == candidate,
            MatchMode::Substring => self.pattern.contains(candidate),
        }
    }
}

/// Why a line was thrown away instead of becoming an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Line exceeded [`MAX_ENTRY_LEN`].
    Overlong,
    /// Final line had no terminating newline; its content may be an
    /// incomplete pattern and must never grant an exemption.
    Unterminated,
}

/// A rejected whitelist line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectedLine {
    pub line: usize,
    pub reason: RejectReason,
}

/// Verdict for a candidate or a whole process identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Whitelisted: never OOM-killed.
    Exempt,
    /// Everyone else: first in line for the OOM killer.
    Standard,
}

impl Classification {
    /// The `oom_score_adj` value this verdict maps to. These are the only
    /// two values the pipeline ever writes.
    pub fn score(self) -> i32 {
        match self {
            Classification::Exempt => -1000,
            Classification::Standard => 1000,
        }
    }
}

/// A loaded whitelist. An empty list classifies everything `Standard`,
/// which is also the fail-open behavior when the file is missing: an
/// operator who has configured nothing must not accidentally make every
/// process immune.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<ExemptionEntry>,
    rejected: Vec<RejectedLine>,
}

impl Whitelist {
    /// A whitelist with no entries; everything classifies `Standard`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read and parse the whitelist file. Missing or unreadable files
    /// fail open to the empty list.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self::parse(&bytes),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "whitelist unavailable, failing open");
                Self::empty()
            }
        }
    }

    /// Parse whitelist file contents line by line.
    pub fn parse(bytes: &[u8]) -> Self {
        let mut entries = Vec::new();
        let mut rejected = Vec::new();

        let mut rest = bytes;
        let mut line_no = 0usize;
        while !rest.is_empty() {
            line_no += 1;
            let (line, terminated) = match rest.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    let line = &rest[..pos];
                    rest = &rest[pos + 1..];
                    (line, true)
                }
                None => {
                    let line = rest;
                    rest = &[];
                    (line, false)
                }
            };

            if !terminated {
                // The tail of the file never saw its newline; treat it as a
                // truncated entry, not a pattern.
                rejected.push(RejectedLine {
                    line: line_no,
                    reason: RejectReason::Unterminated,
                });
                continue;
            }
            if line.len() > MAX_ENTRY_LEN {
                rejected.push(RejectedLine {
                    line: line_no,
                    reason: RejectReason::Overlong,
                });
                continue;
            }

            let line = String::from_utf8_lossy(line);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (pattern, mode) = match line.strip_prefix('!') {
                Some(exact) => (exact, MatchMode::Exact),
                None => (line.as_ref(), MatchMode::Substring),
            };
            if pattern.is_empty() {
                // A bare "!" carries no pattern.
                continue;
            }
            entries.push(ExemptionEntry {
                pattern: pattern.to_string(),
                mode,
                line: line_no,
            });
        }

        Self { entries, rejected }
    }

    /// Lines that were discarded during parsing.
    pub fn rejected(&self) -> &[RejectedLine] {
        &self.rejected
    }

    /// Number of usable entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry matching the candidate, in file order.
    pub fn match_candidate(&self, candidate: &str) -> Option<&ExemptionEntry> {
        self.entries.iter().find(|e| e.matches(candidate))
    }

    /// Classify a single candidate token.
    pub fn classify(&self, candidate: &str) -> Classification {
        match self.match_candidate(candidate) {
            Some(_) => Classification::Exempt,
            None => Classification::Standard,
        }
    }

    /// First (entry, candidate) hit over a candidate set, checking entries
    /// in file order and short-circuiting on the first match.
    pub fn match_any<'a, 'c>(
        &'a self,
        candidates: impl IntoIterator<Item = &'c str> + Clone,
    ) -> Option<(&'a ExemptionEntry, &'c str)> {
        for entry in &self.entries {
            for candidate in candidates.clone() {
                if entry.matches(candidate) {
                    return Some((entry, candidate));
                }
            }
        }
        None
    }
}
