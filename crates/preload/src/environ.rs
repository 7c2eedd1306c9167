//! Environment capture and patching at the exec boundary
//!
//! `exec*e` and `posix_spawn` take a caller-built environment that may
//! have dropped the interception keys. Those keys are re-applied here so
//! the next image keeps reporting, while every caller entry is preserved
//! verbatim.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use buildtrace_common::envs;

use crate::state;

/// An environment block in the `*const *const c_char` shape the exec
/// family wants, with the backing storage it points into.
pub struct EnvBlock {
    // referenced by `ptrs`; must outlive the exec call
    _storage: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl EnvBlock {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let storage: Vec<CString> = pairs
            .iter()
            .filter_map(|(key, value)| CString::new(format!("{key}={value}")).ok())
            .collect();
        let mut ptrs: Vec<*const c_char> = storage.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(std::ptr::null());
        Self {
            _storage: storage,
            ptrs,
        }
    }

    pub fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }
}

/// Merge the session's preload list into a caller-supplied one, keeping
/// the session's libraries in front.
pub fn merge_preload_list(session_list: &str, caller_list: Option<&str>) -> String {
    let mut merged = caller_list.unwrap_or_default().to_string();
    for entry in session_list.split(':').rev() {
        if !entry.is_empty() {
            merged = envs::keep_front_in_list(entry, Some(&merged));
        }
    }
    merged
}

/// Copy a raw environment block into key/value pairs. Entries without
/// `=` and non-UTF8 entries are carried through lossily; order is kept.
///
/// # Safety
///
/// `envp` must be null or a null-terminated array of C strings.
pub unsafe fn capture(envp: *const *const c_char) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if envp.is_null() {
        return pairs;
    }
    let mut cursor = envp;
    while !(*cursor).is_null() {
        let entry = CStr::from_ptr(*cursor).to_string_lossy();
        match entry.split_once('=') {
            Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
            None => pairs.push((entry.to_string(), String::new())),
        }
        cursor = cursor.add(1);
    }
    pairs
}

/// Rebuild a caller environment with the interception keys re-applied.
///
/// Returns the block to hand to the real call plus the map recorded in
/// the report (the environment the new image will actually see).
///
/// # Safety
///
/// `envp` must be null or a null-terminated array of C strings.
pub unsafe fn patched(envp: *const *const c_char) -> (Option<EnvBlock>, HashMap<String, String>) {
    if envp.is_null() {
        return (None, HashMap::new());
    }

    let mut pairs = capture(envp);
    let session = state::session();

    if let Some(destination) = &session.destination {
        upsert(
            &mut pairs,
            envs::DESTINATION_KEY,
            &destination.to_string_lossy(),
        );
    }
    if let Some(reporter) = &session.reporter {
        upsert(&mut pairs, envs::REPORTER_KEY, reporter);
    }
    if session.verbose {
        upsert(&mut pairs, envs::VERBOSE_KEY, "1");
    }
    if let Some(session_list) = &session.preload {
        let caller_list = pairs
            .iter()
            .find(|(key, _)| key == envs::PRELOAD_KEY)
            .map(|(_, value)| value.clone());
        let merged = merge_preload_list(session_list, caller_list.as_deref());
        upsert(&mut pairs, envs::PRELOAD_KEY, &merged);
    }

    let map = pairs.iter().cloned().collect();
    (Some(EnvBlock::from_pairs(&pairs)), map)
}

fn upsert(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    match pairs.iter_mut().find(|(k, _)| k == key) {
        Some((_, v)) => *v = value.to_string(),
        None => pairs.push((key.to_string(), value.to_string())),
    }
}
