/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Monotonic time source and sleep helpers.
//!
//! Every timestamp in the crate comes from `CLOCK_MONOTONIC`, so the periodic
//! backends, the safety monitor and log output all share one time base.
//! [`now`] reports seconds since a process-wide origin that is captured on
//! the first call to [`now`]; the other readers never touch it.

use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;

// ── Constants ─────────────────────────────────────────────────────────────────

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Process-wide origin for [`now`], in raw monotonic nanoseconds.
static ORIGIN_NS: OnceLock<u64> = OnceLock::new();

// ── Error type ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClockError {
    /// Durations must be finite and strictly positive.
    #[error("invalid sleep duration: {0}s")]
    InvalidDuration(f64),

    /// `clock_nanosleep()` returned something other than success or `EINTR`.
    #[error("clock_nanosleep() returned error ({code}) {}", os_error(.code))]
    Sleep { code: i32 },
}

/// Render a raw errno value the way `strerror()` would.
pub(crate) fn os_error(code: &i32) -> std::io::Error {
    std::io::Error::from_raw_os_error(*code)
}

// ── Time source ───────────────────────────────────────────────────────────────

/// Raw `CLOCK_MONOTONIC` reading in nanoseconds.
pub fn monotonic_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // CLOCK_MONOTONIC is always present on Linux; the call cannot fail with a
    // valid pointer.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    timespec_to_ns(&ts)
}

/// Seconds elapsed since the process-wide origin.
pub fn now() -> f64 {
    let origin = *ORIGIN_NS.get_or_init(monotonic_ns);
    monotonic_ns().saturating_sub(origin) as f64 * 1e-9
}

// ── Conversions ───────────────────────────────────────────────────────────────

/// Split a nanosecond count into a `timespec` (whole seconds + remainder).
pub fn ns_to_timespec(ns: u64) -> libc::timespec {
    libc::timespec {
        tv_sec: (ns / NANOS_PER_SEC) as libc::time_t,
        tv_nsec: (ns % NANOS_PER_SEC) as libc::c_long,
    }
}

pub fn timespec_to_ns(ts: &libc::timespec) -> u64 {
    (ts.tv_sec as u64)
        .saturating_mul(NANOS_PER_SEC)
        .saturating_add(ts.tv_nsec as u64)
}

/// Convert a duration in seconds to whole nanoseconds.
///
/// Returns `None` for non-finite, zero, negative or sub-nanosecond values.
pub fn seconds_to_ns(seconds: f64) -> Option<u64> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let ns = (seconds * 1e9).round();
    if ns < 1.0 || ns >= u64::MAX as f64 {
        return None;
    }
    Some(ns as u64)
}

// ── Sleeping ──────────────────────────────────────────────────────────────────

/// Best-effort sleep. Non-positive durations return immediately.
pub fn sleep(seconds: f64) {
    if seconds.is_finite() && seconds > 0.0 {
        std::thread::sleep(Duration::from_secs_f64(seconds));
    }
}

/// Sleep to an absolute `CLOCK_MONOTONIC` deadline computed from `seconds`.
///
/// The absolute form means an `EINTR` wake-up simply re-arms the same
/// deadline instead of stretching the total sleep.
pub fn sleep_rt(seconds: f64) -> Result<(), ClockError> {
    let ns = seconds_to_ns(seconds).ok_or(ClockError::InvalidDuration(seconds))?;
    sleep_until_ns(monotonic_ns().saturating_add(ns))
}

/// Choose between [`sleep_rt`] and [`sleep`].
pub fn sleep_mode(seconds: f64, realtime: bool) -> Result<(), ClockError> {
    if realtime {
        sleep_rt(seconds)
    } else {
        sleep(seconds);
        Ok(())
    }
}

/// Block until the monotonic clock reaches `deadline_ns`.
pub fn sleep_until_ns(deadline_ns: u64) -> Result<(), ClockError> {
    let ts = ns_to_timespec(deadline_ns);
    loop {
        let ret = unsafe {
            libc::clock_nanosleep(
                libc::CLOCK_MONOTONIC,
                libc::TIMER_ABSTIME,
                &ts,
                std::ptr::null_mut(),
            )
        };
        match ret {
            0 => return Ok(()),
            libc::EINTR => continue,
            code => return Err(ClockError::Sleep { code }),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
