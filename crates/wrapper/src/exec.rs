//! Wrapper main flow: report, run the real tool, propagate its status

use std::env;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::PathBuf;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use buildtrace_common::{Execution, Report};

use crate::context::WrapperContext;
use crate::report;
use crate::resolver::resolve_real_tool;

/// Main wrapper execution function.
pub fn run_wrapper() -> Result<i32> {
    let ctx = WrapperContext::from_current_exe()?;

    let real_tool = resolve_real_tool(&ctx.tool_name, &ctx.search_paths)
        .ok_or_else(|| anyhow!("Real tool '{}' not found", ctx.tool_name))?;

    let args: Vec<_> = env::args_os().skip(1).collect();
    let argv: Vec<String> = std::iter::once(ctx.tool_name.clone())
        .chain(args.iter().map(|a| a.to_string_lossy().to_string()))
        .collect();
    let pid = std::process::id();

    report_started(&ctx, &real_tool, argv);

    let status = Command::new(&real_tool)
        .arg0(&ctx.tool_name)
        .args(&args)
        .status()
        .with_context(|| format!("Failed to execute {}", real_tool.display()))?;

    if let Some(signal) = status.signal() {
        report_exit(&ctx, Report::Signalled { pid, signal });
        return Ok(128 + signal);
    }

    let code = status.code().unwrap_or(1);
    report_exit(&ctx, Report::Terminated { pid, status: code });
    Ok(code)
}

fn report_started(ctx: &WrapperContext, real_tool: &PathBuf, arguments: Vec<String>) {
    let Some(destination) = &ctx.destination else {
        return;
    };

    let report = Report::Started {
        pid: std::process::id(),
        ppid: unsafe { libc::getppid() } as u32,
        execution: Execution {
            executable: real_tool.clone(),
            arguments,
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            environment: env::vars().collect(),
        },
    };

    if let Err(e) = report::send(destination, &report) {
        if ctx.verbose {
            eprintln!("buildtrace-wrapper: report not delivered: {e}");
        }
    }
}

fn report_exit(ctx: &WrapperContext, report: Report) {
    let Some(destination) = &ctx.destination else {
        return;
    };
    if let Err(e) = report::send(destination, &report) {
        if ctx.verbose {
            eprintln!("buildtrace-wrapper: exit report not delivered: {e}");
        }
    }
}
