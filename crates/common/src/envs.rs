//! Reserved environment variables and the helpers that prime them
//!
//! A session injects these keys into the build's environment; intercepted
//! descendants read them back to locate the collector. Children must not
//! overwrite them, and the preload library re-applies them to any
//! environment a caller passes to `exec*e`/`posix_spawn`.

use std::path::Path;

/// Session locator: path of the collector's unix socket
pub const DESTINATION_KEY: &str = "BUILDTRACE_DESTINATION";
/// Verbose diagnostics in descendants ("1" enables)
pub const VERBOSE_KEY: &str = "BUILDTRACE_VERBOSE";
/// Absolute path of the wrapper binary
pub const REPORTER_KEY: &str = "BUILDTRACE_REPORTER";
/// Report send timeout in milliseconds (optional override)
pub const TIMEOUT_KEY: &str = "BUILDTRACE_TIMEOUT_MS";

/// Loader preload list, platform-appropriate
#[cfg(target_os = "macos")]
pub const PRELOAD_KEY: &str = "DYLD_INSERT_LIBRARIES";
#[cfg(not(target_os = "macos"))]
pub const PRELOAD_KEY: &str = "LD_PRELOAD";

/// Prefix of the per-tool variables pinning a wrapped compiler to its
/// real executable (e.g. `BUILDTRACE_WRAPPED_GCC=/usr/bin/gcc`).
pub const WRAPPED_PREFIX: &str = "BUILDTRACE_WRAPPED_";

/// Environment key for the real tool behind a wrapper symlink.
///
/// Tool names are uppercased and non-alphanumerics become underscores,
/// so `c++` maps to `BUILDTRACE_WRAPPED_C__`.
pub fn wrapped_key(tool_name: &str) -> String {
    let suffix: String = tool_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{WRAPPED_PREFIX}{suffix}")
}

/// Splice `entry` to the front of a colon-separated preload list,
/// dropping any duplicate occurrence further down.
///
/// The dynamic loader honors the first matching symbol, so the
/// interception library must stay ahead of whatever the build itself
/// preloads.
pub fn keep_front_in_list(entry: &str, current: Option<&str>) -> String {
    let mut result = vec![entry];
    if let Some(current) = current {
        for item in current.split(':') {
            if !item.is_empty() && item != entry {
                result.push(item);
            }
        }
    }
    result.join(":")
}

/// Prepend `dir` to a PATH-like string, deduplicating the new entry.
pub fn prepend_path(dir: &Path, current: Option<&str>) -> String {
    let dir = dir.to_string_lossy();
    let mut result = vec![dir.to_string()];
    if let Some(current) = current {
        for item in current.split(':') {
            if !item.is_empty() && item != dir {
                result.push(item.to_string());
            }
        }
    }
    result.join(":")
}

/// True when the given value of [`VERBOSE_KEY`] enables diagnostics.
pub fn verbose_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}
