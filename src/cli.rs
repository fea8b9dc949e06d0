//! CLI argument parsing for oomguard

use std::path::PathBuf;

use clap::Parser;

use crate::whitelist::DEFAULT_WHITELIST_PATH;

#[derive(Parser, Debug)]
#[command(name = "oomguard")]
#[command(version)]
#[command(
    about = "Marks an agent's forked children as first OOM-kill victims, except whitelisted ones",
    long_about = None
)]
pub struct Cli {
    /// Whitelist file: one pattern per line, '!' prefix for exact match
    #[arg(
        short = 'w',
        long = "whitelist",
        value_name = "PATH",
        default_value = DEFAULT_WHITELIST_PATH
    )]
    pub whitelist: PathBuf,

    /// Append classification events to this file, one JSON object per line
    #[arg(long = "events", value_name = "PATH")]
    pub events: Option<PathBuf>,

    /// Attach to a running process by PID (mutually exclusive with command)
    #[arg(short = 'p', long = "pid", value_name = "PID", conflicts_with = "command")]
    pub pid: Option<i32>,

    /// Classify a candidate name against the whitelist and exit (repeatable)
    #[arg(long = "check", value_name = "NAME")]
    pub check: Vec<String>,

    /// Enable debug output on stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Command to supervise (everything after --)
    #[arg(last = true)]
    pub command: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_command() {
        let cli = Cli::parse_from(["oomguard", "--", "puppet", "agent", "-t"]);
        let cmd = cli.command.unwrap();
        assert_eq!(cmd, ["puppet", "agent", "-t"]);
        assert_eq!(cli.whitelist, PathBuf::from(DEFAULT_WHITELIST_PATH));
    }

    #[test]
    fn test_cli_empty_without_command() {
        let cli = Cli::parse_from(["oomguard"]);
        assert!(cli.command.is_none());
        assert!(cli.pid.is_none());
        assert!(cli.check.is_empty());
    }

    #[test]
    fn test_cli_pid_attach() {
        let cli = Cli::parse_from(["oomguard", "-p", "1234"]);
        assert_eq!(cli.pid, Some(1234));
    }

    #[test]
    fn test_cli_pid_conflicts_with_command() {
        let result = Cli::try_parse_from(["oomguard", "-p", "1", "--", "true"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_whitelist_override() {
        let cli = Cli::parse_from(["oomguard", "-w", "/tmp/wl", "--", "true"]);
        assert_eq!(cli.whitelist, PathBuf::from("/tmp/wl"));
    }

    #[test]
    fn test_cli_check_is_repeatable() {
        let cli = Cli::parse_from(["oomguard", "--check", "sshd", "--check", "zsh"]);
        assert_eq!(cli.check, ["sshd", "zsh"]);
    }

    #[test]
    fn test_cli_events_path() {
        let cli = Cli::parse_from(["oomguard", "--events", "/tmp/ev.jsonl", "--", "true"]);
        assert_eq!(cli.events, Some(PathBuf::from("/tmp/ev.jsonl")));
    }
}
