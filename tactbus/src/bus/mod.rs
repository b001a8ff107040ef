/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Shared field-bus contract: addresses, frames and the transport trait.
//!
//! Bus addresses live in an 11-bit identifier space:
//!
//! ```text
//!  10    9 ......... 5   4 ......... 0
//! [G]   [ source node ]  [ dest node / group ]
//! ```
//!
//! * host → device: `G = 0`, source = host (0), dest = device id
//! * device → group: `G = 1`, source = device id, dest = group id
//!
//! The group flag keeps the two forms disjoint, and every 5-bit field is
//! stored verbatim, so [`BusId::decode`] recovers exactly what was encoded.

pub mod loopback;

use thiserror::Error;

// ── Constants ─────────────────────────────────────────────────────────────────

pub const HOST_ID: u8 = 0;
pub const NODE_ID_WIDTH: u32 = 5;
pub const NODE_ID_MASK: u16 = 0x1F;
pub const GROUP_FLAG: u16 = 0x400;

/// Largest payload a single frame carries.
pub const MAX_FRAME_LEN: usize = 8;

/// Group on which devices answer property reads.
pub const GROUP_PROPERTY: u8 = 6;
/// Group carrying Full-format tactile messages.
pub const GROUP_TACT_FULL: u8 = 8;
/// Group carrying Top10-format tactile messages.
pub const GROUP_TACT_TOP10: u8 = 9;

// ── BusId ─────────────────────────────────────────────────────────────────────

/// Encoded routing address on the shared bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusId(pub u16);

/// Decoded form of a [`BusId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Directed at one node.
    Node { from: u8, to: u8 },
    /// Broadcast by a node to a group.
    Group { from: u8, group: u8 },
}

impl BusId {
    /// Address for a request from the host to `device`.
    pub fn to_device(device: u8) -> BusId {
        BusId(((HOST_ID as u16) << NODE_ID_WIDTH) | (device as u16 & NODE_ID_MASK))
    }

    /// Address for traffic from `device` to `group`.
    pub fn from_group(device: u8, group: u8) -> BusId {
        BusId(
            GROUP_FLAG
                | ((device as u16 & NODE_ID_MASK) << NODE_ID_WIDTH)
                | (group as u16 & NODE_ID_MASK),
        )
    }

    pub fn decode(self) -> Route {
        let from = ((self.0 >> NODE_ID_WIDTH) & NODE_ID_MASK) as u8;
        let low = (self.0 & NODE_ID_MASK) as u8;
        if self.0 & GROUP_FLAG != 0 {
            Route::Group { from, group: low }
        } else {
            Route::Node { from, to: low }
        }
    }
}

impl std::fmt::Display for BusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:03X}", self.0)
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// One bus frame payload (up to [`MAX_FRAME_LEN`] bytes), stored inline so the
/// receive path never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    len: u8,
    data: [u8; MAX_FRAME_LEN],
}

impl Frame {
    /// Copy `payload` into a frame. `None` if it exceeds [`MAX_FRAME_LEN`].
    pub fn new(payload: &[u8]) -> Option<Frame> {
        if payload.len() > MAX_FRAME_LEN {
            return None;
        }
        let mut data = [0u8; MAX_FRAME_LEN];
        data[..payload.len()].copy_from_slice(payload);
        Some(Frame {
            len: payload.len() as u8,
            data,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ── Transport contract ────────────────────────────────────────────────────────

/// Non-zero status code reported by a bus transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("bus error code {0}")]
pub struct BusCode(pub i32);

impl BusCode {
    /// No frame arrived within the transport's wait budget.
    pub const TIMED_OUT: BusCode = BusCode(1);
    /// The payload cannot be carried in one frame.
    pub const FRAME_TOO_LONG: BusCode = BusCode(2);
    /// The transport is closed or disconnected.
    pub const CLOSED: BusCode = BusCode(3);
}

/// Raw frame I/O on the shared bus.
///
/// Implementations must be shareable between the drivers of all attached
/// devices. The core guarantees at most one outstanding request per device,
/// so a transport only has to keep per-address ordering.
pub trait BusTransport: Send + Sync {
    fn send(&self, bus_id: BusId, payload: &[u8]) -> Result<(), BusCode>;

    /// Wait for the next frame addressed to `bus_id`.
    ///
    /// With `realtime` set the wait must be bounded and deterministic; without
    /// it the transport may block like ordinary I/O.
    fn receive(&self, bus_id: BusId, realtime: bool) -> Result<Frame, BusCode>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
