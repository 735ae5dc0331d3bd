//! Process liveness checks.
//!
//! The global lock decides whether a holder crashed by asking whether its
//! recorded pid still exists. That question is answered here, behind the
//! [`LivenessProbe`] trait so the lock algorithm never touches platform APIs.
//!
//! # Platform behavior
//! - **Unix**: `kill(pid, 0)`; `ESRCH` means gone, `EPERM` means the process
//!   exists but belongs to someone else (still alive).
//! - **Windows**: `OpenProcess` with `PROCESS_QUERY_LIMITED_INFORMATION`;
//!   access denied still proves existence.
//! - **Other**: always alive, so staleness falls back to the age heuristic.

use std::fmt;

/// Answers "does a process with this pid exist on this host?".
///
/// Implementations never fail: anything they cannot confirm is reported as
/// whichever answer is safest for the caller's platform.
pub trait LivenessProbe: Send + Sync + fmt::Debug {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probe backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl LivenessProbe for SystemProbe {
    fn is_alive(&self, pid: u32) -> bool {
        is_alive(pid)
    }
}

/// Check whether a process with the given pid currently exists.
///
/// Pid 0 never identifies a lock holder and is reported as not alive.
pub fn is_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    platform_is_alive(pid)
}

#[cfg(unix)]
fn platform_is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal;
    use nix::unistd::Pid;

    // Values above i32::MAX would turn into negative pids (process groups).
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };

    // Signal None is the "null signal": existence check without delivery.
    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(Errno::EPERM) => true,
        Err(e) => {
            tracing::debug!(pid, error = %e, "liveness check inconclusive, assuming alive");
            true
        }
    }
}

#[cfg(windows)]
#[allow(non_snake_case)]
fn platform_is_alive(pid: u32) -> bool {
    use std::ffi::c_void;

    const PROCESS_QUERY_LIMITED_INFORMATION: u32 = 0x1000;
    const ERROR_ACCESS_DENIED: u32 = 5;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn OpenProcess(dwDesiredAccess: u32, bInheritHandle: i32, dwProcessId: u32)
        -> *mut c_void;
        fn CloseHandle(hObject: *mut c_void) -> i32;
        fn GetLastError() -> u32;
    }

    // SAFETY: plain Win32 calls; the handle is closed before returning.
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
        if handle.is_null() {
            return GetLastError() == ERROR_ACCESS_DENIED;
        }
        CloseHandle(handle);
        true
    }
}

#[cfg(not(any(unix, windows)))]
fn platform_is_alive(_pid: u32) -> bool {
    true
}
