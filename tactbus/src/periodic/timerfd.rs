/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Best-effort backend: a `timerfd` armed on `CLOCK_MONOTONIC`.
//!
//! The kernel counts expirations for us; a blocking read returns how many
//! periods elapsed since the previous read, so the missed count is that value
//! minus one. Overruns therefore never shift the phase of the grid.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tracing::{debug, info};

use super::error::SchedError;
use super::{BackendKind, PeriodicBackend};
use crate::clock::ns_to_timespec;

const BACKEND: &str = "timerfd";

pub struct TimerFdBackend {
    fd: OwnedFd,
    period_ns: u64,
}

impl TimerFdBackend {
    /// Create and arm the timer. The first expiration is one period from now.
    pub fn new(period_ns: u64) -> Result<Self, SchedError> {
        let raw = unsafe { libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_CLOEXEC) };
        if raw == -1 {
            return Err(SchedError::last_os_error(BACKEND, "timerfd_create"));
        }
        // SAFETY: `raw` is a freshly created descriptor nobody else owns.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let interval = ns_to_timespec(period_ns);
        let spec = libc::itimerspec {
            it_interval: interval,
            it_value: interval,
        };
        let ret = unsafe { libc::timerfd_settime(fd.as_raw_fd(), 0, &spec, std::ptr::null_mut()) };
        if ret == -1 {
            return Err(SchedError::last_os_error(BACKEND, "timerfd_settime"));
        }

        info!(
            period_s = interval.tv_sec,
            period_ns = interval.tv_nsec,
            "PeriodicLoopTimer is using timerfd"
        );
        Ok(Self { fd, period_ns })
    }

    /// Block until at least one expiration is pending and return the count.
    fn read_expirations(&self) -> Result<u64, SchedError> {
        let mut expirations: u64 = 0;
        loop {
            let n = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    &mut expirations as *mut u64 as *mut libc::c_void,
                    std::mem::size_of::<u64>(),
                )
            };
            if n == std::mem::size_of::<u64>() as isize {
                return Ok(expirations);
            }
            if n == -1 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(SchedError::Backend {
                    backend: BACKEND,
                    primitive: "read(timerfd)",
                    code: err.raw_os_error().unwrap_or(0),
                });
            }
            // A timerfd read is all-or-nothing; a short read means the
            // descriptor is not what we created.
            return Err(SchedError::Backend {
                backend: BACKEND,
                primitive: "read(timerfd)",
                code: libc::EIO,
            });
        }
    }
}

impl PeriodicBackend for TimerFdBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::TimerFd
    }

    fn wait_period(&mut self) -> Result<u64, SchedError> {
        let expirations = self.read_expirations()?;
        let missed = expirations.saturating_sub(1);
        if missed > 0 {
            debug!(
                missed,
                period_ns = self.period_ns,
                "timerfd reported overrun"
            );
        }
        Ok(missed)
    }
}
