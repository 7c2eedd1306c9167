//! PATH search replay for `exec*p` variants
//!
//! The report must carry the binary that will actually run, not the
//! shell token the caller passed, so the libc search is repeated here
//! with the same rules: a name containing a slash is used as-is,
//! anything else walks PATH (falling back to the historical default
//! when PATH is unset) probing for an executable regular file.

use std::env;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

const DEFAULT_PATH: &str = "/bin:/usr/bin";

/// Absolute path of the image `exec*p(file, ...)` would start.
///
/// Falls back to absolutizing the bare name against the working
/// directory when nothing on PATH matches; the exec itself will fail
/// the same way and the report stays truthful about the attempt.
pub fn resolve_executable(file: &str) -> PathBuf {
    if file.contains('/') {
        return absolutize(Path::new(file));
    }

    let path = env::var("PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string());
    for dir in path.split(':') {
        if dir.is_empty() {
            continue;
        }
        let candidate = Path::new(dir).join(file);
        if is_executable(&candidate) {
            return absolutize(&candidate);
        }
    }

    absolutize(Path::new(file))
}

pub(crate) fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn is_executable(path: &Path) -> bool {
    let Ok(cstr) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    (unsafe { libc::access(cstr.as_ptr(), libc::X_OK) == 0 })
        && path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn make_executable(path: &Path) {
        fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    #[test]
    #[serial]
    fn bare_name_walks_path_in_order() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        fs::create_dir(&first).unwrap();
        fs::create_dir(&second).unwrap();
        make_executable(&second.join("mycc"));

        let saved = env::var_os("PATH");
        env::set_var(
            "PATH",
            format!("{}:{}", first.display(), second.display()),
        );
        let resolved = resolve_executable("mycc");
        match saved {
            Some(p) => env::set_var("PATH", p),
            None => env::remove_var("PATH"),
        }

        assert_eq!(resolved, second.join("mycc"));
    }

    #[test]
    #[serial]
    fn slash_names_bypass_the_search() {
        let resolved = resolve_executable("/bin/sh");
        assert_eq!(resolved, PathBuf::from("/bin/sh"));
    }

    #[test]
    #[serial]
    fn non_executable_entries_are_skipped() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("bin");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("tool"), "data").unwrap();

        let saved = env::var_os("PATH");
        env::set_var("PATH", dir.as_os_str());
        let resolved = resolve_executable("tool");
        match saved {
            Some(p) => env::set_var("PATH", p),
            None => env::remove_var("PATH"),
        }

        // nothing matched: the bare name is absolutized against cwd
        assert!(resolved.ends_with("tool"));
        assert!(resolved.is_absolute());
    }
}
