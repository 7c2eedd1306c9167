//! Interposed libc entry points
//!
//! Every definition here shadows a libc symbol. The pattern is uniform:
//! resolve the real symbol through `RTLD_NEXT`, take the per-thread
//! reentrancy guard, build and send the report, then delegate with the
//! caller's arguments (environment patched where the variant accepts
//! one). The real call's return value and errno pass through untouched.
//! A hook entered without the guard delegates immediately, unobserved.

use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use libc::{posix_spawn_file_actions_t, posix_spawnattr_t, FILE};

use crate::environ;
use crate::report;
use crate::resolve;

const SHELL: &str = "/bin/sh";

/// Resolve a libc symbol through the next object in the lookup chain,
/// caching the address in a per-symbol atomic slot.
macro_rules! real {
    ($name:ident, $ty:ty) => {{
        static ADDR: AtomicUsize = AtomicUsize::new(0);
        static RESOLVED: AtomicBool = AtomicBool::new(false);
        if !RESOLVED.load(Ordering::Acquire) {
            let sym = unsafe {
                libc::dlsym(
                    libc::RTLD_NEXT,
                    concat!(stringify!($name), "\0").as_ptr() as *const c_char,
                )
            };
            if !sym.is_null() {
                ADDR.store(sym as usize, Ordering::Release);
            }
            RESOLVED.store(true, Ordering::Release);
        }
        let addr = ADDR.load(Ordering::Acquire);
        if addr != 0 {
            Some(unsafe { std::mem::transmute::<usize, $ty>(addr) })
        } else {
            None
        }
    }};
}

// ---------------------------------------------------------------------------
// Per-thread reentrancy guard
// ---------------------------------------------------------------------------
//
// An interposed call made from inside the reporting machinery itself
// must not be observed again: the guard makes every hook a pass-through
// while one is already active on this thread.

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

struct ReentrancyGuard;

impl ReentrancyGuard {
    fn enter() -> Option<Self> {
        IN_HOOK.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(ReentrancyGuard)
            }
        })
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        IN_HOOK.with(|flag| flag.set(false));
    }
}

unsafe fn set_errno(value: c_int) {
    #[cfg(target_os = "linux")]
    {
        *libc::__errno_location() = value;
    }
    #[cfg(target_os = "macos")]
    {
        *libc::__error() = value;
    }
}

/// Copy a null-terminated argv into owned strings.
unsafe fn capture_argv(argv: *const *const c_char) -> Vec<String> {
    let mut arguments = Vec::new();
    if argv.is_null() {
        return arguments;
    }
    let mut cursor = argv;
    while !(*cursor).is_null() {
        arguments.push(CStr::from_ptr(*cursor).to_string_lossy().into_owned());
        cursor = cursor.add(1);
    }
    arguments
}

fn own_environment() -> HashMap<String, String> {
    std::env::vars().collect()
}

unsafe fn path_of(raw: *const c_char) -> PathBuf {
    if raw.is_null() {
        return PathBuf::new();
    }
    resolve::absolutize(std::path::Path::new(
        &CStr::from_ptr(raw).to_string_lossy().into_owned(),
    ))
}

fn pid() -> u32 {
    std::process::id()
}

fn ppid() -> u32 {
    unsafe { libc::getppid() as u32 }
}

// --- image-replacing variants -------------------------------------------

/// # Safety
/// Same contract as libc `execve`.
#[no_mangle]
pub unsafe extern "C" fn execve(
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    type ExecveFn = unsafe extern "C" fn(
        *const c_char,
        *const *const c_char,
        *const *const c_char,
    ) -> c_int;
    let Some(real) = real!(execve, ExecveFn) else {
        set_errno(libc::ENOSYS);
        return -1;
    };
    let Some(_guard) = ReentrancyGuard::enter() else {
        return real(path, argv, envp);
    };

    let (patched, reported_env) = environ::patched(envp);
    report::spawn(pid(), ppid(), path_of(path), capture_argv(argv), reported_env);

    match &patched {
        Some(block) => real(path, argv, block.as_ptr()),
        None => real(path, argv, envp),
    }
}

/// # Safety
/// Same contract as libc `execv`.
#[no_mangle]
pub unsafe extern "C" fn execv(path: *const c_char, argv: *const *const c_char) -> c_int {
    type ExecvFn = unsafe extern "C" fn(*const c_char, *const *const c_char) -> c_int;
    let Some(real) = real!(execv, ExecvFn) else {
        set_errno(libc::ENOSYS);
        return -1;
    };
    let Some(_guard) = ReentrancyGuard::enter() else {
        return real(path, argv);
    };

    // the new image inherits this process's environment, keys included
    report::spawn(
        pid(),
        ppid(),
        path_of(path),
        capture_argv(argv),
        own_environment(),
    );

    real(path, argv)
}

/// # Safety
/// Same contract as libc `execvp`.
#[no_mangle]
pub unsafe extern "C" fn execvp(file: *const c_char, argv: *const *const c_char) -> c_int {
    type ExecvpFn = unsafe extern "C" fn(*const c_char, *const *const c_char) -> c_int;
    let Some(real) = real!(execvp, ExecvpFn) else {
        set_errno(libc::ENOSYS);
        return -1;
    };
    let Some(_guard) = ReentrancyGuard::enter() else {
        return real(file, argv);
    };

    let executable = if file.is_null() {
        PathBuf::new()
    } else {
        resolve::resolve_executable(&CStr::from_ptr(file).to_string_lossy())
    };
    report::spawn(pid(), ppid(), executable, capture_argv(argv), own_environment());

    real(file, argv)
}

/// # Safety
/// Same contract as glibc `execvpe`.
#[no_mangle]
pub unsafe extern "C" fn execvpe(
    file: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    type ExecvpeFn = unsafe extern "C" fn(
        *const c_char,
        *const *const c_char,
        *const *const c_char,
    ) -> c_int;
    let Some(real) = real!(execvpe, ExecvpeFn) else {
        set_errno(libc::ENOSYS);
        return -1;
    };
    let Some(_guard) = ReentrancyGuard::enter() else {
        return real(file, argv, envp);
    };

    let executable = if file.is_null() {
        PathBuf::new()
    } else {
        resolve::resolve_executable(&CStr::from_ptr(file).to_string_lossy())
    };
    let (patched, reported_env) = environ::patched(envp);
    report::spawn(pid(), ppid(), executable, capture_argv(argv), reported_env);

    match &patched {
        Some(block) => real(file, argv, block.as_ptr()),
        None => real(file, argv, envp),
    }
}

/// # Safety
/// Same contract as libc `fexecve`.
#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn fexecve(
    fd: c_int,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    type FexecveFn =
        unsafe extern "C" fn(c_int, *const *const c_char, *const *const c_char) -> c_int;
    let Some(real) = real!(fexecve, FexecveFn) else {
        set_errno(libc::ENOSYS);
        return -1;
    };
    let Some(_guard) = ReentrancyGuard::enter() else {
        return real(fd, argv, envp);
    };

    let executable = std::fs::read_link(format!("/proc/self/fd/{fd}"))
        .unwrap_or_else(|_| PathBuf::from(format!("fd:{fd}")));
    let (patched, reported_env) = environ::patched(envp);
    report::spawn(pid(), ppid(), executable, capture_argv(argv), reported_env);

    match &patched {
        Some(block) => real(fd, argv, block.as_ptr()),
        None => real(fd, argv, envp),
    }
}

// --- spawning variants ---------------------------------------------------

type SpawnFn = unsafe extern "C" fn(
    *mut libc::pid_t,
    *const c_char,
    *const posix_spawn_file_actions_t,
    *const posix_spawnattr_t,
    *const *const c_char,
    *const *const c_char,
) -> c_int;

/// Run the real `posix_spawn`/`posix_spawnp` with a patched environment
/// and report the child on success, when its pid is known. An attempt
/// that fails spawns no process and must not fabricate an event.
///
/// The report goes out after the real call by necessity (the child pid
/// does not exist before it), so it must be a blocking socket write
/// issued straight away: no yield point may separate reading
/// `*pid_slot` from completing the send, or the child's own first exec
/// report could reach the collector ahead of this one.
unsafe fn spawn_and_report(
    real: SpawnFn,
    child: *mut libc::pid_t,
    path: *const c_char,
    file_actions: *const posix_spawn_file_actions_t,
    attrp: *const posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
    executable: PathBuf,
) -> c_int {
    let (patched, reported_env) = environ::patched(envp);

    let mut local_pid: libc::pid_t = 0;
    let pid_slot = if child.is_null() { &mut local_pid } else { child };

    let result = match &patched {
        Some(block) => real(pid_slot, path, file_actions, attrp, argv, block.as_ptr()),
        None => real(pid_slot, path, file_actions, attrp, argv, envp),
    };

    if result == 0 {
        report::spawn(
            *pid_slot as u32,
            pid(),
            executable,
            capture_argv(argv),
            reported_env,
        );
    }

    result
}

/// # Safety
/// Same contract as libc `posix_spawn`.
#[no_mangle]
pub unsafe extern "C" fn posix_spawn(
    child: *mut libc::pid_t,
    path: *const c_char,
    file_actions: *const posix_spawn_file_actions_t,
    attrp: *const posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let Some(real) = real!(posix_spawn, SpawnFn) else {
        return libc::ENOSYS;
    };
    let Some(_guard) = ReentrancyGuard::enter() else {
        return real(child, path, file_actions, attrp, argv, envp);
    };
    spawn_and_report(
        real,
        child,
        path,
        file_actions,
        attrp,
        argv,
        envp,
        path_of(path),
    )
}

/// # Safety
/// Same contract as libc `posix_spawnp`.
#[no_mangle]
pub unsafe extern "C" fn posix_spawnp(
    child: *mut libc::pid_t,
    file: *const c_char,
    file_actions: *const posix_spawn_file_actions_t,
    attrp: *const posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let Some(real) = real!(posix_spawnp, SpawnFn) else {
        return libc::ENOSYS;
    };
    let Some(_guard) = ReentrancyGuard::enter() else {
        return real(child, file, file_actions, attrp, argv, envp);
    };
    let executable = if file.is_null() {
        PathBuf::new()
    } else {
        resolve::resolve_executable(&CStr::from_ptr(file).to_string_lossy())
    };
    spawn_and_report(real, child, file, file_actions, attrp, argv, envp, executable)
}

// --- shell conveniences --------------------------------------------------
//
// glibc routes these through an internal spawn alias that never touches
// the public exec symbols, so the shell invocation is reported here.

unsafe fn report_shell(command: *const c_char) {
    if command.is_null() {
        return;
    }
    let command = CStr::from_ptr(command).to_string_lossy().into_owned();
    report::spawn(
        pid(),
        ppid(),
        PathBuf::from(SHELL),
        vec!["sh".to_string(), "-c".to_string(), command],
        own_environment(),
    );
}

/// # Safety
/// Same contract as libc `system`.
#[no_mangle]
pub unsafe extern "C" fn system(command: *const c_char) -> c_int {
    type SystemFn = unsafe extern "C" fn(*const c_char) -> c_int;
    let Some(real) = real!(system, SystemFn) else {
        set_errno(libc::ENOSYS);
        return -1;
    };

    if let Some(_guard) = ReentrancyGuard::enter() {
        report_shell(command);
    }
    real(command)
}

/// # Safety
/// Same contract as libc `popen`.
#[no_mangle]
pub unsafe extern "C" fn popen(command: *const c_char, mode: *const c_char) -> *mut FILE {
    type PopenFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FILE;
    let Some(real) = real!(popen, PopenFn) else {
        set_errno(libc::ENOSYS);
        return std::ptr::null_mut();
    };

    if let Some(_guard) = ReentrancyGuard::enter() {
        report_shell(command);
    }
    real(command, mode)
}
