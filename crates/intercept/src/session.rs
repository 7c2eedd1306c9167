//! Per-run session state
//!
//! A session owns the socket endpoint location and knows how to prime
//! the build's environment so descendants report back: the preload mode
//! injects the library into the loader's preload list, the wrapper mode
//! materializes a directory of compiler symlinks and puts it in front
//! of PATH.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use buildtrace_common::envs;
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cli::Cli;

/// Compiler names shadowed by the wrapper farm.
const WRAPPED_TOOLS: &[&str] = &["cc", "c++", "gcc", "g++", "clang", "clang++"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Library injected via the loader's preload mechanism
    Preload,
    /// Wrapper symlinks shadowing compilers on PATH
    Wrapper,
    /// Neither available; only the root command is recorded
    Unsupervised,
}

pub struct Session {
    pub mode: Mode,
    pub verbose: bool,
    /// Socket path handed to descendants via the locator key
    locator: PathBuf,
    library: Option<PathBuf>,
    wrapper: Option<PathBuf>,
    /// Wrapper symlink directory; keeps the TempDir alive for the run
    farm: Option<Farm>,
    /// Holds the socket's parent directory for the run
    _socket_dir: TempDir,
}

struct Farm {
    dir: TempDir,
    /// tool name -> real executable, exported as pin variables
    pins: Vec<(String, PathBuf)>,
}

impl Session {
    pub fn from_args(args: &Cli) -> Result<Self> {
        let socket_dir = tempfile::Builder::new()
            .prefix("buildtrace-")
            .tempdir()
            .context("Failed to create session directory")?;
        let locator = socket_dir
            .path()
            .join(format!("{}.sock", Uuid::now_v7().simple()));

        let exe_dir = default_tool_dir();
        let library = args
            .library
            .clone()
            .or_else(|| exe_dir.as_ref().map(|d| d.join(preload_library_name())));
        let wrapper = args
            .wrapper
            .clone()
            .or_else(|| exe_dir.as_ref().map(|d| d.join("buildtrace-wrapper")));

        let mode = select_mode(args, library.as_deref(), wrapper.as_deref());
        debug!(?mode, locator = %locator.display(), "session created");

        let farm = match mode {
            Mode::Wrapper => {
                let wrapper = wrapper.as_ref().expect("wrapper mode requires a wrapper");
                Some(build_farm(wrapper)?)
            }
            _ => None,
        };

        Ok(Self {
            mode,
            verbose: args.verbose,
            locator,
            library,
            wrapper,
            farm,
            _socket_dir: socket_dir,
        })
    }

    pub fn locator(&self) -> &Path {
        &self.locator
    }

    /// The environment the supervised build starts with: the operator's
    /// own, plus the session keys, plus the mode-specific priming.
    pub fn child_environment(&self) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = env::vars().collect();

        env.insert(
            envs::DESTINATION_KEY.to_string(),
            self.locator.to_string_lossy().to_string(),
        );
        if self.verbose {
            env.insert(envs::VERBOSE_KEY.to_string(), "1".to_string());
        }
        if let Some(wrapper) = &self.wrapper {
            env.insert(
                envs::REPORTER_KEY.to_string(),
                wrapper.to_string_lossy().to_string(),
            );
        }

        match self.mode {
            Mode::Preload => {
                let library = self
                    .library
                    .as_ref()
                    .expect("preload mode requires a library")
                    .to_string_lossy();
                let current = env.get(envs::PRELOAD_KEY).cloned();
                env.insert(
                    envs::PRELOAD_KEY.to_string(),
                    envs::keep_front_in_list(&library, current.as_deref()),
                );
            }
            Mode::Wrapper => {
                let farm = self.farm.as_ref().expect("wrapper mode requires a farm");
                let current = env.get("PATH").cloned();
                env.insert(
                    "PATH".to_string(),
                    envs::prepend_path(farm.dir.path(), current.as_deref()),
                );
                for (tool, real) in &farm.pins {
                    env.insert(envs::wrapped_key(tool), real.to_string_lossy().to_string());
                }
            }
            Mode::Unsupervised => {}
        }

        env
    }
}

fn default_tool_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

fn preload_library_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "libbuildtrace_preload.dylib"
    } else {
        "libbuildtrace_preload.so"
    }
}

fn select_mode(args: &Cli, library: Option<&Path>, wrapper: Option<&Path>) -> Mode {
    let library_ok = library.map(Path::is_file).unwrap_or(false);
    let wrapper_ok = wrapper.map(Path::is_file).unwrap_or(false);

    if args.force_preload {
        if !library_ok {
            warn!("preload forced but the library is missing; only the root command is recorded");
            return Mode::Unsupervised;
        }
        return Mode::Preload;
    }
    if args.force_wrapper {
        if !wrapper_ok {
            warn!("wrapper forced but the executable is missing; only the root command is recorded");
            return Mode::Unsupervised;
        }
        return Mode::Wrapper;
    }
    if library_ok {
        Mode::Preload
    } else if wrapper_ok {
        warn!("preload library not found, falling back to compiler wrappers");
        Mode::Wrapper
    } else {
        warn!("no interception mechanism available; only the root command is recorded");
        Mode::Unsupervised
    }
}

/// Create the wrapper symlink directory and pin each shadowed name to
/// the real tool it currently resolves to.
fn build_farm(wrapper: &Path) -> Result<Farm> {
    let dir = tempfile::Builder::new()
        .prefix("buildtrace-wrappers-")
        .tempdir()
        .context("Failed to create wrapper directory")?;

    let mut pins = Vec::new();
    for tool in WRAPPED_TOOLS {
        let link = dir.path().join(tool);
        std::os::unix::fs::symlink(wrapper, &link)
            .with_context(|| format!("Failed to link wrapper as {tool}"))?;
        if let Some(real) = which(tool) {
            pins.push((tool.to_string(), real));
        }
    }

    debug!(dir = %dir.path().display(), tools = WRAPPED_TOOLS.len(), "wrapper farm ready");
    Ok(Farm { dir, pins })
}

/// Minimal PATH search used to pin wrapped tools and to absolutize the
/// root command for its event record.
pub fn which(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return path.is_file().then(|| absolutize(&path));
    }
    let path = env::var("PATH").ok()?;
    for dir in path.split(':').filter(|d| !d.is_empty()) {
        let candidate = Path::new(dir).join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && (m.permissions().mode() & 0o111 != 0))
        .unwrap_or(false)
}
