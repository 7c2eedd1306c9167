//! Wrapper invocation context
//!
//! Works out which tool name this process stands in for and which
//! directories are safe to resolve the real tool from.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use buildtrace_common::envs;

/// Execution context for one wrapper invocation.
#[derive(Debug)]
pub struct WrapperContext {
    /// The compiler name this wrapper was invoked as (e.g. "gcc")
    pub tool_name: String,
    /// Directory holding the wrapper symlinks
    pub wrapper_dir: PathBuf,
    /// Search paths with the wrapper directory filtered out
    pub search_paths: Vec<PathBuf>,
    /// Collector socket, absent when running outside a session
    pub destination: Option<PathBuf>,
    pub verbose: bool,
}

impl WrapperContext {
    /// Build the context from argv[0] and the environment.
    pub fn from_current_exe() -> Result<Self> {
        let exe = env::current_exe().context("Failed to get current executable path")?;

        let mut wrapper_dir = exe
            .parent()
            .ok_or_else(|| anyhow!("Executable has no parent directory"))?
            .to_path_buf();

        let mut tool_name = exe
            .file_name()
            .ok_or_else(|| anyhow!("Executable has no filename"))?
            .to_string_lossy()
            .to_string();

        // current_exe resolves symlinks; argv[0] still carries the name
        // the build called, which is the identity that matters here.
        if let Some(invoked) = env::args_os().next() {
            if !invoked.is_empty() {
                let invoked = PathBuf::from(invoked);
                if let Some(name) = invoked.file_name() {
                    tool_name = name.to_string_lossy().to_string();
                }
                if let Some(parent) = invoked.parent() {
                    if parent.is_absolute() {
                        wrapper_dir = parent.to_path_buf();
                    }
                }
            }
        }

        let search_paths = build_clean_search_path(&wrapper_dir, env::var("PATH").ok())?;

        Ok(Self {
            tool_name,
            wrapper_dir,
            search_paths,
            destination: env::var_os(envs::DESTINATION_KEY).map(PathBuf::from),
            verbose: envs::verbose_enabled(env::var(envs::VERBOSE_KEY).ok().as_deref()),
        })
    }
}

/// Build the search path for the real tool, excluding the wrapper
/// directory so the wrapper never resolves to itself.
pub fn build_clean_search_path(
    wrapper_dir: &Path,
    path: Option<String>,
) -> Result<Vec<PathBuf>> {
    let path = path.ok_or_else(|| anyhow!("No PATH in environment"))?;

    let mut seen = std::collections::HashSet::new();
    let paths: Vec<PathBuf> = path
        .split(':')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/'))
        .filter(|p| !Path::new(p).starts_with(wrapper_dir))
        .filter(|p| seen.insert(p.to_string()))
        .map(PathBuf::from)
        .collect();

    if paths.is_empty() {
        return Err(anyhow!("No search paths left after removing {}", wrapper_dir.display()));
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_search_path_filters_wrapper_dir() {
        let wrapper_dir = PathBuf::from("/opt/wrappers");
        let path = format!("/usr/bin:{}:/bin", wrapper_dir.display());
        let paths = build_clean_search_path(&wrapper_dir, Some(path)).unwrap();
        assert_eq!(paths, vec![PathBuf::from("/usr/bin"), PathBuf::from("/bin")]);
    }

    #[test]
    fn clean_search_path_deduplicates() {
        let wrapper_dir = PathBuf::from("/opt/wrappers");
        let path = "/usr/bin:/bin:/usr/bin:/usr/local/bin:/bin".to_string();
        let paths = build_clean_search_path(&wrapper_dir, Some(path)).unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin"),
                PathBuf::from("/usr/local/bin"),
            ]
        );
    }

    #[test]
    fn all_paths_filtered_is_an_error() {
        let wrapper_dir = PathBuf::from("/opt/wrappers");
        let path = format!("{0}:{0}/sub", wrapper_dir.display());
        assert!(build_clean_search_path(&wrapper_dir, Some(path)).is_err());
    }
}
