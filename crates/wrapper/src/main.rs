//! buildtrace compiler wrapper - reports and re-runs the real tool
//!
//! This binary is symlinked under compiler names (gcc, c++, ...) in a
//! directory the intercept session puts in front of PATH. It reports the
//! invocation to the collector, then runs the real tool and propagates
//! its exit status unchanged.

use std::process::ExitCode;

use buildtrace_wrapper::run_wrapper;

fn main() -> ExitCode {
    match run_wrapper() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("buildtrace-wrapper error: {e:?}");
            ExitCode::from(126)
        }
    }
}
