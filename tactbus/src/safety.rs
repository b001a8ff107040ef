/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Safety-system supervision.
//!
//! The arm's safety module reports a mode (E-stop, idle, active) and whether
//! any fault is latched. [`SafetyMonitor`] polls a [`SafetySignal`] on its own
//! thread and publishes the latest reading through a single atomic, so the
//! control loop can check it without touching the bus.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

// ── Signal ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyMode {
    Estop = 0,
    Idle = 1,
    Active = 2,
}

impl SafetyMode {
    fn from_bits(bits: u8) -> SafetyMode {
        match bits {
            1 => SafetyMode::Idle,
            2 => SafetyMode::Active,
            _ => SafetyMode::Estop,
        }
    }
}

/// Source of safety state. Polled, never pushed.
pub trait SafetySignal: Send + Sync + 'static {
    fn mode(&self) -> SafetyMode;
    fn has_faults(&self) -> bool;
}

/// Lock-free signal settable from any thread.
#[derive(Debug)]
pub struct AtomicSafetySignal {
    mode: AtomicU8,
    faults: AtomicBool,
}

impl Default for AtomicSafetySignal {
    fn default() -> Self {
        Self::new(SafetyMode::Idle)
    }
}

impl AtomicSafetySignal {
    pub fn new(mode: SafetyMode) -> Self {
        Self {
            mode: AtomicU8::new(mode as u8),
            faults: AtomicBool::new(false),
        }
    }

    pub fn set_mode(&self, mode: SafetyMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    pub fn set_faults(&self, faults: bool) {
        self.faults.store(faults, Ordering::Release);
    }
}

impl SafetySignal for AtomicSafetySignal {
    fn mode(&self) -> SafetyMode {
        SafetyMode::from_bits(self.mode.load(Ordering::Acquire))
    }

    fn has_faults(&self) -> bool {
        self.faults.load(Ordering::Acquire)
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetySnapshot {
    pub mode: SafetyMode,
    pub has_faults: bool,
}

const FAULT_BIT: u8 = 0x80;

impl SafetySnapshot {
    fn read(signal: &dyn SafetySignal) -> Self {
        Self {
            mode: signal.mode(),
            has_faults: signal.has_faults(),
        }
    }

    fn pack(self) -> u8 {
        self.mode as u8 | if self.has_faults { FAULT_BIT } else { 0 }
    }

    fn unpack(bits: u8) -> Self {
        Self {
            mode: SafetyMode::from_bits(bits & !FAULT_BIT),
            has_faults: bits & FAULT_BIT != 0,
        }
    }

    /// Motion must stop on E-stop or any latched fault.
    pub fn should_stop(&self) -> bool {
        self.has_faults || self.mode == SafetyMode::Estop
    }
}

// ── Monitor ───────────────────────────────────────────────────────────────────

struct Shared {
    latest: AtomicU8,
    running: AtomicBool,
}

pub struct SafetyMonitor {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl SafetyMonitor {
    /// Take a first reading, then keep polling `signal` every `poll_period`
    /// on a thread named `safety-monitor`.
    pub fn spawn<S: SafetySignal>(signal: Arc<S>, poll_period: Duration) -> io::Result<Self> {
        let first = SafetySnapshot::read(signal.as_ref());
        let shared = Arc::new(Shared {
            latest: AtomicU8::new(first.pack()),
            running: AtomicBool::new(true),
        });
        info!(mode = ?first.mode, faults = first.has_faults, "safety monitor started");

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("safety-monitor".into())
            .spawn(move || poll_loop(signal.as_ref(), &worker, first, poll_period))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn snapshot(&self) -> SafetySnapshot {
        SafetySnapshot::unpack(self.shared.latest.load(Ordering::Acquire))
    }

    pub fn should_stop(&self) -> bool {
        self.snapshot().should_stop()
    }
}

impl Drop for SafetyMonitor {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                error!("safety monitor thread panicked");
            }
        }
        debug!("safety monitor stopped");
    }
}

fn poll_loop(signal: &dyn SafetySignal, shared: &Shared, mut last: SafetySnapshot, period: Duration) {
    while shared.running.load(Ordering::Acquire) {
        thread::park_timeout(period);
        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        let now = SafetySnapshot::read(signal);
        shared.latest.store(now.pack(), Ordering::Release);
        if now == last {
            continue;
        }

        if now.has_faults && !last.has_faults {
            warn!(mode = ?now.mode, "safety fault latched");
        } else if !now.has_faults && last.has_faults {
            info!(mode = ?now.mode, "safety faults cleared");
        }
        match now.mode {
            SafetyMode::Estop if last.mode != SafetyMode::Estop => warn!("E-stop engaged"),
            _ if now.mode != last.mode => info!(from = ?last.mode, to = ?now.mode, "safety mode changed"),
            _ => {}
        }
        last = now;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(2);

    fn wait_for(monitor: &SafetyMonitor, want: SafetySnapshot) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if monitor.snapshot() == want {
                return true;
            }
            thread::sleep(POLL);
        }
        false
    }

    #[test]
    fn first_snapshot_is_available_immediately() {
        let signal = Arc::new(AtomicSafetySignal::new(SafetyMode::Active));
        let monitor = SafetyMonitor::spawn(signal, Duration::from_secs(60)).unwrap();
        assert_eq!(
            monitor.snapshot(),
            SafetySnapshot { mode: SafetyMode::Active, has_faults: false }
        );
        assert!(!monitor.should_stop());
    }

    #[test]
    fn monitor_follows_signal_changes() {
        let signal = Arc::new(AtomicSafetySignal::new(SafetyMode::Idle));
        let monitor = SafetyMonitor::spawn(Arc::clone(&signal), POLL).unwrap();

        signal.set_mode(SafetyMode::Active);
        assert!(wait_for(&monitor, SafetySnapshot { mode: SafetyMode::Active, has_faults: false }));

        signal.set_faults(true);
        assert!(wait_for(&monitor, SafetySnapshot { mode: SafetyMode::Active, has_faults: true }));
        assert!(monitor.should_stop());

        signal.set_faults(false);
        signal.set_mode(SafetyMode::Estop);
        assert!(wait_for(&monitor, SafetySnapshot { mode: SafetyMode::Estop, has_faults: false }));
        assert!(monitor.should_stop());
    }

    #[test]
    fn drop_stops_a_slow_poller_promptly() {
        let signal = Arc::new(AtomicSafetySignal::default());
        let monitor = SafetyMonitor::spawn(signal, Duration::from_secs(60)).unwrap();
        let start = Instant::now();
        drop(monitor);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn snapshot_packing_keeps_mode_and_fault() {
        for mode in [SafetyMode::Estop, SafetyMode::Idle, SafetyMode::Active] {
            for has_faults in [false, true] {
                let s = SafetySnapshot { mode, has_faults };
                assert_eq!(SafetySnapshot::unpack(s.pack()), s);
            }
        }
    }
}
