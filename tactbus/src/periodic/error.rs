/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error type for the periodic loop timer.
//!
//! A missed release point is **not** an error: it is reported as the `u64`
//! returned from [`PeriodicLoopTimer::wait()`](super::PeriodicLoopTimer::wait).
//! Everything in [`SchedError`] is fatal to the call that produced it.

use thiserror::Error;

use crate::clock::os_error;

#[derive(Debug, Error)]
pub enum SchedError {
    /// The period is zero, negative, non-finite or below one nanosecond.
    #[error("invalid loop period: {0}s (must be a finite value > 0)")]
    InvalidPeriod(f64),

    /// The real-time priority hint is outside the `SCHED_FIFO` range.
    #[error("invalid real-time priority {priority} (valid: {min}..={max})")]
    InvalidPriority { priority: i32, min: i32, max: i32 },

    /// An OS primitive behind the selected backend failed.
    ///
    /// `primitive` names the failing call (`"timerfd_create"`,
    /// `"pthread_setschedparam"`, `"read(timerfd)"`, ...) and `code` is the raw
    /// errno-style value it reported.
    #[error("{backend} backend: {primitive}: ({code}) {}", os_error(.code))]
    Backend {
        backend: &'static str,
        primitive: &'static str,
        code: i32,
    },
}

impl SchedError {
    /// Build a [`SchedError::Backend`] from the thread's current `errno`.
    pub(crate) fn last_os_error(backend: &'static str, primitive: &'static str) -> Self {
        SchedError::Backend {
            backend,
            primitive,
            code: std::io::Error::last_os_error().raw_os_error().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_names_the_primitive_and_code() {
        let err = SchedError::Backend {
            backend: "timerfd",
            primitive: "timerfd_create",
            code: libc::EMFILE,
        };
        let msg = err.to_string();
        assert!(msg.contains("timerfd_create"), "{msg}");
        assert!(msg.contains(&format!("({})", libc::EMFILE)), "{msg}");
    }

    #[test]
    fn primitive_with_argument_is_rendered_verbatim() {
        let err = SchedError::Backend {
            backend: "timerfd",
            primitive: "read(timerfd)",
            code: libc::EINTR,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("timerfd backend: read(timerfd): "), "{msg}");
        assert!(!msg.contains("()"), "{msg}");
    }
}
