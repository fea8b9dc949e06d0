//! Process-creation watcher using ptrace fork-following
//!
//! Supervises a host program (spawned or attached) and reports every
//! process its tree creates to a [`ProcessCreated`] handler. Fork, vfork
//! and clone events announce the new pid; a later exec event re-announces
//! it, because at fork time the child's cmdline still mirrors its parent
//! and exec is when its real identity appears.
//!
//! Supervision is observationally transparent: signals are forwarded,
//! children run as they would untraced, and the host's exit status is
//! returned unchanged.

use std::collections::HashSet;
use std::os::unix::process::CommandExt;
use std::process::Command;

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use thiserror::Error;

use crate::pipeline::ProcessCreated;

/// Errors establishing or running supervision. Classification failures are
/// not represented here; the pipeline is infallible at its interface.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("no command given to supervise")]
    EmptyCommand,
    #[error("failed to fork supervised command: {0}")]
    Fork(Errno),
    #[error("failed to attach to pid {pid}: {source}")]
    Attach { pid: i32, source: Errno },
    #[error("failed to configure ptrace on pid {pid}: {source}")]
    Configure { pid: i32, source: Errno },
    #[error("failed to wait for supervised processes: {0}")]
    Wait(Errno),
}

/// Spawn `command` under supervision and run the event loop until it
/// exits. Returns the command's exit code (`128 + signal` if killed by a
/// signal), exactly as it would report untraced.
pub fn run_command<H: ProcessCreated>(command: &[String], handler: &H) -> Result<i32, WatchError> {
    let (program, args) = command.split_first().ok_or(WatchError::EmptyCommand)?;

    match unsafe { fork() }.map_err(WatchError::Fork)? {
        ForkResult::Parent { child } => supervise(child, handler),
        ForkResult::Child => {
            // In the child: request tracing and become the host program.
            let _ = ptrace::traceme();
            let err = Command::new(program).args(args).exec();
            eprintln!("oomguard: failed to exec {program}: {err}");
            std::process::exit(127);
        }
    }
}

/// Attach to a running host program by pid and supervise it until it exits.
pub fn attach_to_pid<H: ProcessCreated>(pid: i32, handler: &H) -> Result<i32, WatchError> {
    let root = Pid::from_raw(pid);
    ptrace::attach(root).map_err(|source| WatchError::Attach { pid, source })?;
    tracing::info!(pid, "attached");
    supervise(root, handler)
}

fn supervise<H: ProcessCreated>(root: Pid, handler: &H) -> Result<i32, WatchError> {
    // First stop: exec trap for a spawned child, SIGSTOP for an attach.
    waitpid(root, None).map_err(WatchError::Wait)?;

    let options = ptrace::Options::PTRACE_O_TRACEFORK
        | ptrace::Options::PTRACE_O_TRACEVFORK
        | ptrace::Options::PTRACE_O_TRACECLONE
        | ptrace::Options::PTRACE_O_TRACEEXEC;
    ptrace::setoptions(root, options).map_err(|source| WatchError::Configure {
        pid: root.as_raw(),
        source,
    })?;
    ptrace::cont(root, None).map_err(|source| WatchError::Configure {
        pid: root.as_raw(),
        source,
    })?;

    let mut tracked: HashSet<Pid> = HashSet::from([root]);
    // Pids whose one attach-time SIGSTOP has already been consumed.
    let mut announced: HashSet<Pid> = HashSet::new();
    loop {
        match waitpid(None, Some(WaitPidFlag::__WALL)) {
            Ok(WaitStatus::PtraceEvent(pid, _, event)) => {
                handle_event(pid, event, root, &mut tracked, handler);
                let _ = ptrace::cont(pid, None);
            }
            Ok(WaitStatus::Stopped(pid, sig)) => {
                // Every auto-attached child reports one SIGSTOP when it
                // first stops, possibly before its parent's fork event
                // arrives. Swallow exactly that one; any later SIGSTOP is
                // real job control and is delivered like every other
                // signal.
                let deliver = if swallow_attach_stop(pid, sig, root, &mut announced) {
                    tracked.insert(pid);
                    None
                } else {
                    Some(sig)
                };
                let _ = ptrace::cont(pid, deliver);
            }
            Ok(WaitStatus::Exited(pid, code)) => {
                tracked.remove(&pid);
                if pid == root {
                    release(&tracked);
                    return Ok(code);
                }
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                tracked.remove(&pid);
                if pid == root {
                    release(&tracked);
                    return Ok(128 + sig as i32);
                }
            }
            Ok(_) => {}
            Err(Errno::EINTR) => {}
            Err(Errno::ECHILD) => return Ok(0),
            Err(err) => return Err(WatchError::Wait(err)),
        }
    }
}

fn handle_event<H: ProcessCreated>(
    pid: Pid,
    event: i32,
    root: Pid,
    tracked: &mut HashSet<Pid>,
    handler: &H,
) {
    match event {
        libc::PTRACE_EVENT_FORK | libc::PTRACE_EVENT_VFORK | libc::PTRACE_EVENT_CLONE => {
            match ptrace::getevent(pid) {
                Ok(raw) => {
                    let child = Pid::from_raw(raw as i32);
                    tracked.insert(child);
                    handler.process_created(child);
                }
                Err(err) => {
                    tracing::debug!(pid = pid.as_raw(), %err, "fork event without child pid");
                }
            }
        }
        libc::PTRACE_EVENT_EXEC if pid != root => {
            // The child replaced itself; classify its real command line.
            handler.process_created(pid);
        }
        _ => {}
    }
}

/// True exactly once per non-root tracee: for the SIGSTOP it reports when
/// it is first auto-attached. The root's attach stop is consumed before
/// the event loop starts, so its SIGSTOPs are always delivered.
fn swallow_attach_stop(
    pid: Pid,
    sig: Signal,
    root: Pid,
    announced: &mut HashSet<Pid>,
) -> bool {
    sig == Signal::SIGSTOP && pid != root && announced.insert(pid)
}

/// Best-effort detach of surviving tracees once the root is gone. Any
/// tracee this misses is released by the kernel when the watcher exits.
fn release(tracked: &HashSet<Pid>) {
    for &pid in tracked {
        let _ = ptrace::detach(pid, None);
    }
}
