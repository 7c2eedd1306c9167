//! Build supervision
//!
//! Spawns the build in its own process group with the primed
//! environment, registers the root execution with the collector, and
//! forwards SIGINT/SIGTERM to the group so the whole tree stops
//! together.
//!
//! The root registration goes through the dedicated [`Message::Root`]
//! input: a freshly spawned build can exec children before this task's
//! own registration reaches the writer, and the writer holds such
//! early reports back until the root owns rid 1. Attribution therefore
//! never depends on scheduling.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitStatus;

use anyhow::{Context, Result};
use buildtrace_common::{Execution, Report};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::collector::Message;
use crate::session::which;

/// Run the build to completion and return the exit code the operator
/// should see: the build's own, or `128+signal`.
pub async fn run_build(
    command: &[String],
    environment: HashMap<String, String>,
    reporter: mpsc::Sender<Message>,
) -> Result<i32> {
    let program = &command[0];
    let executable = which(program).unwrap_or_else(|| PathBuf::from(program));

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(&command[1..]);
    cmd.env_clear().envs(&environment);
    // own process group, so signal forwarding reaches the whole tree
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn build command '{program}'"))?;
    let pid = child.id().unwrap_or_default();
    debug!(pid, command = %command.join(" "), "build started");

    let root = Report::Started {
        pid,
        ppid: std::process::id(),
        execution: Execution {
            executable,
            arguments: command.to_vec(),
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            environment,
        },
    };
    if reporter.send(Message::Root(root)).await.is_err() {
        warn!("collector is gone before the build started");
    }

    let mut sigint = signal(SignalKind::interrupt()).context("SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("SIGTERM handler")?;

    let (status, interrupted) = tokio::select! {
        status = child.wait() => (status.context("Failed to wait for the build")?, None),
        _ = sigint.recv() => {
            forward_signal(pid, Signal::SIGINT);
            (child.wait().await.context("Failed to wait for the build")?, Some(Signal::SIGINT))
        }
        _ = sigterm.recv() => {
            forward_signal(pid, Signal::SIGTERM);
            (child.wait().await.context("Failed to wait for the build")?, Some(Signal::SIGTERM))
        }
    };

    let code = report_exit(pid, status, &reporter).await;
    Ok(match interrupted {
        Some(signal) => 128 + signal as i32,
        None => code,
    })
}

fn forward_signal(pid: u32, signal: Signal) {
    debug!(%signal, "forwarding to the build's process group");
    if let Err(err) = killpg(Pid::from_raw(pid as i32), signal) {
        warn!(%signal, "failed to signal the build: {err}");
    }
}

async fn report_exit(pid: u32, status: ExitStatus, reporter: &mpsc::Sender<Message>) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    let (report, code) = match status.signal() {
        Some(signal) => (Report::Signalled { pid, signal }, 128 + signal),
        None => {
            let code = status.code().unwrap_or(1);
            (Report::Terminated { pid, status: code }, code)
        }
    };
    if reporter.send(Message::Report(report)).await.is_err() {
        warn!("collector is gone before the build exit was recorded");
    }
    code
}
