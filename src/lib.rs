//! oomguard - OOM-kill triage for orchestration-agent children
//!
//! Supervises a host program under ptrace fork-following and sets
//! `oom_score_adj` for every process its tree creates: `1000` (first OOM
//! victim) by default, `-1000` (never killed) for processes matching the
//! operator's whitelist.

pub mod cli;
pub mod events;
pub mod identity;
pub mod pipeline;
pub mod score;
pub mod watcher;
pub mod whitelist;
