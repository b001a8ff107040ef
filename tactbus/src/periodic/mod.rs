/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fixed-period loop pacing with missed-deadline reporting.
//!
//! [`PeriodicLoopTimer`] hands a control loop one release point per period.
//! Each [`wait()`](PeriodicLoopTimer::wait) blocks until the next release
//! point and returns how many release points were skipped because the loop
//! overran.
//!
//! # Backends
//!
//! | Kind | Mechanism | Missed count |
//! |---|---|---|
//! | [`BackendKind::HardRealtime`] | `SCHED_FIFO` thread, absolute `clock_nanosleep` | whole periods elapsed past the release point |
//! | [`BackendKind::TimerFd`] | `timerfd` on `CLOCK_MONOTONIC` | expirations − 1 |
//!
//! The kind is a capability of the host, detected once per process with
//! [`BackendKind::detect`]; loop code only ever sees the
//! [`PeriodicBackend`] trait.
//!
//! # Example
//! ```rust,no_run
//! use tactbus::periodic::PeriodicLoopTimer;
//!
//! let mut timer = PeriodicLoopTimer::new(0.002, None)?;
//! loop {
//!     let missed = timer.wait()?;
//!     if missed > 0 {
//!         eprintln!("overran by {missed} period(s)");
//!     }
//!     // ... one control cycle ...
//! #   break;
//! }
//! # Ok::<(), tactbus::periodic::SchedError>(())
//! ```

pub mod error;
pub mod realtime;
pub mod timerfd;

pub use error::SchedError;

use std::sync::OnceLock;

use serde::Deserialize;
use tracing::{debug, info};

use crate::clock;
use realtime::RealtimeBackend;
use timerfd::TimerFdBackend;

// ── Constants ─────────────────────────────────────────────────────────────────

/// `SCHED_FIFO` priority used when the caller gives no hint.
pub const DEFAULT_RT_PRIORITY: i32 = 50;

/// Present and reading `1` on PREEMPT_RT kernels.
const RT_KERNEL_FLAG: &str = "/sys/kernel/realtime";

static DETECTED: OnceLock<BackendKind> = OnceLock::new();

// ── Backend selection ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    HardRealtime,
    TimerFd,
}

impl BackendKind {
    /// Host capability, probed on first call and cached for the process.
    pub fn detect() -> BackendKind {
        *DETECTED.get_or_init(|| {
            let rt_kernel = std::fs::read_to_string(RT_KERNEL_FLAG)
                .map(|s| s.trim() == "1")
                .unwrap_or(false);
            let kind = if rt_kernel {
                BackendKind::HardRealtime
            } else {
                BackendKind::TimerFd
            };
            info!(?kind, rt_kernel, "periodic backend detected");
            kind
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::HardRealtime => "hard_realtime",
            BackendKind::TimerFd => "timer_fd",
        }
    }
}

/// Backend choice as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    #[default]
    Auto,
    HardRealtime,
    TimerFd,
}

impl BackendPreference {
    pub fn resolve(self) -> BackendKind {
        match self {
            BackendPreference::Auto => BackendKind::detect(),
            BackendPreference::HardRealtime => BackendKind::HardRealtime,
            BackendPreference::TimerFd => BackendKind::TimerFd,
        }
    }
}

impl std::str::FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(BackendPreference::Auto),
            "hard_realtime" => Ok(BackendPreference::HardRealtime),
            "timer_fd" => Ok(BackendPreference::TimerFd),
            other => Err(format!(
                "unknown backend '{other}' (valid: auto, hard_realtime, timer_fd)"
            )),
        }
    }
}

// ── Backend trait ─────────────────────────────────────────────────────────────

/// One release-point source.
pub trait PeriodicBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Block until the next release point; return release points missed.
    fn wait_period(&mut self) -> Result<u64, SchedError>;
}

// ── PeriodicLoopTimer ─────────────────────────────────────────────────────────

/// Paces one control loop. Owned by that loop; not shared across threads.
pub struct PeriodicLoopTimer {
    period: f64,
    first_run: bool,
    backend: Box<dyn PeriodicBackend>,
}

impl PeriodicLoopTimer {
    /// Build a timer on the backend the host supports.
    ///
    /// `priority` is the `SCHED_FIFO` priority hint for the hard real-time
    /// backend (ignored by the timerfd backend).
    pub fn new(period: f64, priority: Option<i32>) -> Result<Self, SchedError> {
        Self::with_backend(BackendKind::detect(), period, priority)
    }

    /// Build a timer on an explicitly chosen backend.
    ///
    /// # Errors
    /// [`SchedError::InvalidPeriod`] for a non-positive period, or
    /// [`SchedError::Backend`] when the timer cannot be created or the thread
    /// cannot be promoted.
    pub fn with_backend(
        kind: BackendKind,
        period: f64,
        priority: Option<i32>,
    ) -> Result<Self, SchedError> {
        let period_ns = clock::seconds_to_ns(period).ok_or(SchedError::InvalidPeriod(period))?;

        let backend: Box<dyn PeriodicBackend> = match kind {
            BackendKind::HardRealtime => Box::new(RealtimeBackend::new(
                period_ns,
                priority.unwrap_or(DEFAULT_RT_PRIORITY),
            )?),
            BackendKind::TimerFd => Box::new(TimerFdBackend::new(period_ns)?),
        };

        Ok(Self::from_backend(period, backend))
    }

    /// Wrap an already-built backend.
    pub fn from_backend(period: f64, backend: Box<dyn PeriodicBackend>) -> Self {
        Self {
            period,
            first_run: true,
            backend,
        }
    }

    /// Block until the next release point.
    ///
    /// Returns the number of release points missed since the previous call.
    /// The first call always returns 0: whatever happened between
    /// construction and the first wait is start-up, not an overrun.
    pub fn wait(&mut self) -> Result<u64, SchedError> {
        let missed = self.backend.wait_period()?;
        if self.first_run {
            self.first_run = false;
            if missed > 0 {
                debug!(missed, "ignoring overrun before first release point");
            }
            return Ok(0);
        }
        Ok(missed)
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
