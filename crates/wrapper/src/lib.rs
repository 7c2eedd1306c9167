//! Wrapper-mode execution reporting
//!
//! The fallback interception path for builds the preload library cannot
//! reach (statically linked tools, preload-hostile toolchains). The
//! wrapper stands in for a compiler on PATH:
//!
//! 1. It detects which name it was invoked under.
//! 2. It resolves the real tool, preferring the session's
//!    `BUILDTRACE_WRAPPED_<NAME>` pin and falling back to a clean PATH
//!    with its own directory removed.
//! 3. It reports the invocation, runs the tool, reports the exit, and
//!    exits with the tool's status (`128+signal` on signal death).
//!
//! A missing collector downgrades the wrapper to a transparent relay;
//! the build must never notice it.

pub use context::WrapperContext;
pub use exec::run_wrapper;
pub use resolver::resolve_real_tool;

mod context;
mod exec;
mod report;
mod resolver;
