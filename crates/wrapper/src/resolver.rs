//! Real-tool resolution
//!
//! The session pins each wrapped name to its real executable via
//! `BUILDTRACE_WRAPPED_<NAME>`; the clean-PATH walk is the fallback for
//! wrappers deployed by hand.

use std::env;
use std::path::{Path, PathBuf};

use buildtrace_common::envs;

/// Find the real executable behind a wrapped tool name.
pub fn resolve_real_tool(tool_name: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    if let Some(pinned) = env::var_os(envs::wrapped_key(tool_name)) {
        let pinned = PathBuf::from(pinned);
        if is_executable(&pinned) {
            return Some(pinned);
        }
    }

    search_paths
        .iter()
        .map(|dir| dir.join(tool_name))
        .find(|candidate| is_executable(candidate))
}

/// Check if a path is an executable regular file.
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(metadata) => metadata.is_file() && (metadata.permissions().mode() & 0o111 != 0),
        Err(_) => false,
    }
}
