use anyhow::{Context, Result};
use clap::Parser;
use oomguard::cli::Cli;
use oomguard::events::{EventSink, JsonlSink, NullSink};
use oomguard::pipeline::Pipeline;
use oomguard::watcher;
use oomguard::whitelist::{Classification, Whitelist};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Classify candidate names against the whitelist and print the verdicts.
/// Exit code 0 if every candidate is exempt, 1 otherwise.
fn run_check(cli: &Cli) -> i32 {
    let whitelist = Whitelist::load(&cli.whitelist);
    let mut all_exempt = true;
    for candidate in &cli.check {
        let verdict = match whitelist.classify(candidate) {
            Classification::Exempt => "exempt",
            Classification::Standard => "standard",
        };
        if verdict == "standard" {
            all_exempt = false;
        }
        println!("{candidate}: {verdict}");
    }
    i32::from(!all_exempt)
}

/// Run supervision with the configured sink and propagate the host's exit
/// code.
fn run_watcher<S: EventSink>(cli: &Cli, sink: S) -> Result<i32> {
    let pipeline = Pipeline::new(cli.whitelist.clone(), sink);
    match (&cli.pid, &cli.command) {
        (Some(pid), None) => watcher::attach_to_pid(*pid, &pipeline)
            .with_context(|| format!("failed to supervise pid {pid}")),
        (None, Some(command)) => {
            watcher::run_command(command, &pipeline).context("failed to supervise command")
        }
        _ => anyhow::bail!("Must specify either -p PID or a command after --"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !cli.check.is_empty() {
        std::process::exit(run_check(&cli));
    }

    let code = match &cli.events {
        Some(path) => {
            let sink = JsonlSink::open(path)
                .with_context(|| format!("failed to open event log {}", path.display()))?;
            run_watcher(&cli, sink)?
        }
        None => run_watcher(&cli, NullSink)?,
    };

    // Exit with the supervised program's exit code
    std::process::exit(code);
}
