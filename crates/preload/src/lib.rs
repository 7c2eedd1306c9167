//! Exec-family interposition library
//!
//! Loaded into every process of a supervised build via the dynamic
//! loader's preload mechanism. Shadows the libc entry points that
//! replace or spawn a process image (`exec*`, `posix_spawn`,
//! `posix_spawnp`, `system`, `popen`), reports the outgoing execution to
//! the collector named by `BUILDTRACE_DESTINATION`, then delegates to
//! the real symbol resolved with `dlsym(RTLD_NEXT, ...)`.
//!
//! The intercepted program must observe nothing: same return values,
//! same errno, same process state. Reporting is best effort; when the
//! collector is unreachable the call proceeds and at most one database
//! entry goes missing.
//!
//! ## Global state
//!
//! The library is loaded into arbitrary multi-threaded programs and
//! must stay safe across `fork`. Its process-wide state is therefore
//! exactly: the per-symbol resolution slots (atomics), and one
//! lazily-initialized immutable [`state::Session`] read from the
//! environment at first use. The only per-thread state is the
//! reentrancy flag that turns a hook entered from the library's own
//! machinery into a plain pass-through.
//!
//! The variadic `execl`/`execlp`/`execle` wrappers cannot be defined in
//! stable Rust; libcs that route them through the public `execve`
//! symbol are still observed, elsewhere the loss is a missing report.

mod environ;
mod hooks;
mod report;
mod resolve;
mod state;

pub use environ::{merge_preload_list, EnvBlock};
pub use resolve::resolve_executable;
