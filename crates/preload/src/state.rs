//! Once-read session state
//!
//! Everything here is read from the environment on first use and never
//! mutated afterwards; that property is what keeps the library safe
//! under `fork` and arbitrary caller threads.

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use buildtrace_common::envs;

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// Immutable per-process view of the intercept session.
pub struct Session {
    /// Collector socket path; `None` means run unobserved.
    pub destination: Option<PathBuf>,
    /// Wrapper binary advertised by the session, forwarded to children.
    pub reporter: Option<String>,
    /// Preload list as seen when this process started; re-applied to
    /// caller-supplied environments so descendants stay intercepted.
    pub preload: Option<String>,
    pub verbose: bool,
    pub timeout: Duration,
}

static SESSION: OnceLock<Session> = OnceLock::new();

pub fn session() -> &'static Session {
    SESSION.get_or_init(|| {
        let verbose = envs::verbose_enabled(env::var(envs::VERBOSE_KEY).ok().as_deref());
        let timeout = env::var(envs::TIMEOUT_KEY)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SEND_TIMEOUT);
        Session {
            destination: env::var_os(envs::DESTINATION_KEY).map(PathBuf::from),
            reporter: env::var(envs::REPORTER_KEY).ok(),
            preload: env::var(envs::PRELOAD_KEY).ok(),
            verbose,
            timeout,
        }
    })
}

/// Verbose diagnostics straight to stderr; this library owns no logger.
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::state::session().verbose {
            eprintln!("buildtrace-preload: {}", format_args!($($arg)*));
        }
    };
}

pub(crate) use verbose;
