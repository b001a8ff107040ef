/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Hard real-time backend: a `SCHED_FIFO` thread sleeping to absolute
//! release points with `clock_nanosleep(TIMER_ABSTIME)`.
//!
//! Release bookkeeping follows the periodic-task model of RT co-kernels:
//!
//! * release point in the future → sleep to it, report 0 missed;
//! * release point already passed ("timed out") → do not sleep, report every
//!   whole period that elapsed past it, and move the release point to the
//!   next slot of the same grid.

use std::sync::Once;

use tracing::{debug, info, warn};

use super::error::SchedError;
use super::{BackendKind, PeriodicBackend};
use crate::clock;

const BACKEND: &str = "hard_realtime";

static LOCK_MEMORY: Once = Once::new();

/// Lock current and future pages once per process.
///
/// Failure only degrades determinism (page faults on first touch), so it is
/// logged rather than returned.
fn lock_memory_once() {
    LOCK_MEMORY.call_once(|| {
        let ret = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if ret != 0 {
            warn!(
                error = %std::io::Error::last_os_error(),
                "mlockall() failed; real-time loop may take page faults (needs CAP_IPC_LOCK)"
            );
        }
    });
}

/// Move the calling thread into `SCHED_FIFO` at `priority`.
///
/// A thread that already runs under `SCHED_FIFO` or `SCHED_RR` keeps its
/// current policy and priority; that is not an error.
fn promote_current_thread(priority: i32) -> Result<(), SchedError> {
    let thread = unsafe { libc::pthread_self() };

    let mut policy: libc::c_int = 0;
    let mut param = libc::sched_param { sched_priority: 0 };
    let ret = unsafe { libc::pthread_getschedparam(thread, &mut policy, &mut param) };
    if ret != 0 {
        return Err(SchedError::Backend {
            backend: BACKEND,
            primitive: "pthread_getschedparam",
            code: ret,
        });
    }
    if policy == libc::SCHED_FIFO || policy == libc::SCHED_RR {
        debug!(
            policy,
            priority = param.sched_priority,
            "thread already real-time, keeping current policy"
        );
        return Ok(());
    }

    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::pthread_setschedparam(thread, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        return Err(SchedError::Backend {
            backend: BACKEND,
            primitive: "pthread_setschedparam",
            code: ret,
        });
    }
    info!(priority, "thread promoted to SCHED_FIFO");
    Ok(())
}

/// Release-point arithmetic, separated from the clock for testing.
///
/// Returns `(missed, next_release_ns)` for a loop that wakes at `now_ns`
/// having been due at `release_ns`. Only meaningful when `now_ns >= release_ns`.
pub(crate) fn overrun(release_ns: u64, now_ns: u64, period_ns: u64) -> (u64, u64) {
    let missed = (now_ns - release_ns) / period_ns;
    let next = release_ns + (missed + 1) * period_ns;
    (missed, next)
}

pub struct RealtimeBackend {
    period_ns: u64,
    /// Next release point, absolute `CLOCK_MONOTONIC` nanoseconds.
    release_ns: u64,
}

impl RealtimeBackend {
    pub fn new(period_ns: u64, priority: i32) -> Result<Self, SchedError> {
        let (min, max) = unsafe {
            (
                libc::sched_get_priority_min(libc::SCHED_FIFO),
                libc::sched_get_priority_max(libc::SCHED_FIFO),
            )
        };
        if priority < min || priority > max {
            return Err(SchedError::InvalidPriority { priority, min, max });
        }

        lock_memory_once();
        promote_current_thread(priority)?;

        let release_ns = clock::monotonic_ns() + period_ns;
        info!(period_ns, priority, "PeriodicLoopTimer is using SCHED_FIFO + clock_nanosleep");
        Ok(Self {
            period_ns,
            release_ns,
        })
    }
}

impl PeriodicBackend for RealtimeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::HardRealtime
    }

    fn wait_period(&mut self) -> Result<u64, SchedError> {
        let now = clock::monotonic_ns();
        if now >= self.release_ns {
            let (missed, next) = overrun(self.release_ns, now, self.period_ns);
            self.release_ns = next;
            if missed > 0 {
                debug!(missed, "release point already passed");
            }
            return Ok(missed);
        }

        clock::sleep_until_ns(self.release_ns).map_err(|e| match e {
            clock::ClockError::Sleep { code } => SchedError::Backend {
                backend: BACKEND,
                primitive: "clock_nanosleep",
                code,
            },
            clock::ClockError::InvalidDuration(_) => SchedError::Backend {
                backend: BACKEND,
                primitive: "clock_nanosleep",
                code: libc::EINVAL,
            },
        })?;
        self.release_ns += self.period_ns;
        Ok(0)
    }
}
