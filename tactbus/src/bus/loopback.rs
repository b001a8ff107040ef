/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! In-process [`BusTransport`] with simulated devices.
//!
//! Frames sent to a device address are handed to the [`SimDevice`]
//! registered for that id, which may queue replies on any address. Receivers
//! pop replies per address in FIFO order. Sent frames are only kept when the
//! send log is switched on with [`LoopbackBus::with_send_log`].
//!
//! Used by the unit tests and by the `tactbus` binary when no hardware
//! transport is available. Not meant for production traffic.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use super::{BusCode, BusId, BusTransport, Frame, Route};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Length of one wait slice on the real-time receive path.
pub const RT_RECEIVE_SLICE: Duration = Duration::from_micros(500);

/// Slices a real-time receive waits before reporting [`BusCode::TIMED_OUT`].
pub const RT_RECEIVE_SLICES: u32 = 20;

// ── Simulated device hook ─────────────────────────────────────────────────────

/// Behaviour of one simulated node on the loopback bus.
pub trait SimDevice: Send + 'static {
    /// React to `payload` sent to this device, appending any reply frames.
    fn on_frame(&mut self, payload: &[u8], replies: &mut Vec<(BusId, Frame)>);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// One entry of the send log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentFrame {
    pub bus_id: BusId,
    pub frame: Frame,
}

// ── LoopbackBus ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    queues: HashMap<BusId, VecDeque<Frame>>,
    sent: Vec<SentFrame>,
    devices: HashMap<u8, Box<dyn SimDevice>>,
    closed: bool,
}

#[derive(Default)]
pub struct LoopbackBus {
    inner: Mutex<Inner>,
    arrived: Condvar,
    /// Upper bound for best-effort receives; `None` blocks indefinitely.
    receive_timeout: Option<Duration>,
    log_sent: bool,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound best-effort receives so a missing reply surfaces as
    /// [`BusCode::TIMED_OUT`] instead of hanging the caller.
    pub fn with_receive_timeout(timeout: Duration) -> Self {
        Self::with_options(Some(timeout))
    }

    /// Bus with an optional best-effort receive bound.
    pub fn with_options(receive_timeout: Option<Duration>) -> Self {
        Self {
            receive_timeout,
            ..Self::default()
        }
    }

    /// Keep every sent frame for [`sent`](Self::sent). Unbounded; meant for
    /// tests and short diagnostic runs.
    pub fn with_send_log(mut self) -> Self {
        self.log_sent = true;
        self
    }

    /// Register `sim` as the node answering frames sent to `device`.
    /// Replaces any device previously registered under that id.
    pub fn attach_device(&self, device: u8, sim: impl SimDevice) {
        debug!(device, "simulated device attached");
        self.inner.lock().devices.insert(device, Box::new(sim));
    }

    /// Run `f` against the simulated device registered under `device`.
    ///
    /// Returns `None` if no device is registered or it is not a `D`.
    pub fn with_device<D: SimDevice, R>(&self, device: u8, f: impl FnOnce(&mut D) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        let sim = inner.devices.get_mut(&device)?;
        sim.as_any_mut().downcast_mut::<D>().map(f)
    }

    /// Queue a raw frame on `bus_id` as if a device had sent it.
    pub fn inject(&self, bus_id: BusId, payload: &[u8]) -> Result<(), BusCode> {
        let frame = Frame::new(payload).ok_or(BusCode::FRAME_TOO_LONG)?;
        self.inner
            .lock()
            .queues
            .entry(bus_id)
            .or_default()
            .push_back(frame);
        self.arrived.notify_all();
        Ok(())
    }

    /// Snapshot of every frame sent so far. Always empty unless the bus was
    /// built [`with_send_log`](Self::with_send_log).
    pub fn sent(&self) -> Vec<SentFrame> {
        self.inner.lock().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.inner.lock().sent.clear();
    }

    /// Number of frames waiting on `bus_id`.
    pub fn pending(&self, bus_id: BusId) -> usize {
        self.inner.lock().queues.get(&bus_id).map_or(0, VecDeque::len)
    }

    /// Fail every subsequent send and receive with [`BusCode::CLOSED`].
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.arrived.notify_all();
    }
}

impl BusTransport for LoopbackBus {
    fn send(&self, bus_id: BusId, payload: &[u8]) -> Result<(), BusCode> {
        let frame = Frame::new(payload).ok_or(BusCode::FRAME_TOO_LONG)?;

        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(BusCode::CLOSED);
        }
        if self.log_sent {
            inner.sent.push(SentFrame { bus_id, frame });
        }
        trace!(%bus_id, len = frame.len(), "loopback send");

        if let Route::Node { to, .. } = bus_id.decode() {
            let mut replies = Vec::new();
            if let Some(sim) = inner.devices.get_mut(&to) {
                sim.on_frame(frame.payload(), &mut replies);
            }
            if !replies.is_empty() {
                for (reply_id, reply) in replies {
                    inner.queues.entry(reply_id).or_default().push_back(reply);
                }
                self.arrived.notify_all();
            }
        }
        Ok(())
    }

    fn receive(&self, bus_id: BusId, realtime: bool) -> Result<Frame, BusCode> {
        // a bound too large for the clock means no bound
        let deadline = self
            .receive_timeout
            .and_then(|t| Instant::now().checked_add(t));
        let mut slices_left = RT_RECEIVE_SLICES;

        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(BusCode::CLOSED);
            }
            if let Some(frame) = inner.queues.get_mut(&bus_id).and_then(VecDeque::pop_front) {
                return Ok(frame);
            }

            if realtime {
                if slices_left == 0 {
                    return Err(BusCode::TIMED_OUT);
                }
                slices_left -= 1;
                self.arrived.wait_for(&mut inner, RT_RECEIVE_SLICE);
            } else {
                match deadline {
                    Some(deadline) => {
                        if self.arrived.wait_until(&mut inner, deadline).timed_out()
                            && inner.queues.get(&bus_id).map_or(true, VecDeque::is_empty)
                        {
                            return Err(BusCode::TIMED_OUT);
                        }
                    }
                    None => self.arrived.wait(&mut inner),
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
