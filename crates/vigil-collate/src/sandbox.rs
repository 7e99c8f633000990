// SPDX-License-Identifier: MIT OR Apache-2.0
//! Collation process sandbox.
//!
//! Entered after every input and output file is open and before any
//! untrusted input is consumed. On Linux the process gives up the
//! ability to gain privileges and to create new file descriptors;
//! already-open descriptors keep working. Entry failure is fatal to the
//! run; `--no-sandbox` is a debugging opt-out that logs a warning.

use crate::error::CollateError;

/// Enter the sandbox.
#[cfg(target_os = "linux")]
pub fn enter() -> Result<(), CollateError> {
    let ret = unsafe {
        libc::prctl(
            libc::PR_SET_NO_NEW_PRIVS,
            1 as libc::c_ulong,
            0 as libc::c_ulong,
            0 as libc::c_ulong,
            0 as libc::c_ulong,
        )
    };
    if ret != 0 {
        return Err(CollateError::Sandbox(format!(
            "PR_SET_NO_NEW_PRIVS: {}",
            std::io::Error::last_os_error()
        )));
    }

    // No new descriptors: collation reads and writes what it already
    // holds.
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &limit) };
    if ret != 0 {
        return Err(CollateError::Sandbox(format!(
            "RLIMIT_NOFILE: {}",
            std::io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Enter the sandbox. Not implemented for this platform; runs
/// unconfined.
#[cfg(not(target_os = "linux"))]
pub fn enter() -> Result<(), CollateError> {
    tracing::warn!("sandbox not implemented on this platform");
    Ok(())
}
