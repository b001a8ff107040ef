/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Property get/set over the shared bus.
//!
//! Property access is the only primitive: a device's reporting mode is
//! changed by writing a property, and fresh data is requested by reading the
//! same property. Which of the two a caller needs depends on state the caller
//! tracks (see [`crate::tactile::driver`]).
//!
//! # Wire shapes
//!
//! | Frame | Address | Payload |
//! |---|---|---|
//! | get request | host → device | `[prop]` |
//! | set | host → device | `[0x80 \| prop, 0x00, v0, v1, v2, v3]` (little-endian `i32`) |
//! | property reply | device → [`GROUP_PROPERTY`] | `[prop, 0x00, v0 ..]` (1–4 value bytes, sign-extended) |
//!
//! Replies with a format of their own (the tactile streams) are decoded by a
//! caller-supplied [`ReplyDecoder`].

pub mod error;

pub use error::{DecodeError, ProtocolError};

use std::sync::Arc;

use tracing::trace;

use crate::bus::{BusId, BusTransport, GROUP_PROPERTY};

// ── Constants ─────────────────────────────────────────────────────────────────

pub const PROPERTY_MASK: u8 = 0x7F;
pub const SET_FLAG: u8 = 0x80;

/// Smallest property reply: property byte, pad byte, one value byte.
const MIN_PROPERTY_REPLY_LEN: usize = 3;
/// Largest property reply: property byte, pad byte, four value bytes.
const MAX_PROPERTY_REPLY_LEN: usize = 6;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Address of one device on the bus (`1..=31`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u8);

impl DeviceId {
    pub fn new(id: u8) -> Result<Self, ProtocolError> {
        if id == 0 || id as u16 > crate::bus::NODE_ID_MASK {
            return Err(ProtocolError::InvalidDevice(id));
        }
        Ok(DeviceId(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Property number on a device (`0..=127`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId(u8);

impl PropertyId {
    pub fn new(id: u8) -> Result<Self, ProtocolError> {
        if id > PROPERTY_MASK {
            return Err(ProtocolError::InvalidProperty(id));
        }
        Ok(PropertyId(id))
    }

    /// Compile-time constructor; bits above the 7-bit range are dropped.
    pub const fn masked(id: u8) -> Self {
        PropertyId(id & PROPERTY_MASK)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

// ── Decoder seam ──────────────────────────────────────────────────────────────

/// Turns one reply payload into caller-owned output.
///
/// `parse` must either fully succeed or leave `out` untouched.
pub trait ReplyDecoder {
    type Output;

    /// Address the reply arrives on.
    fn bus_id(device: DeviceId) -> BusId;

    fn parse(
        device: DeviceId,
        property: PropertyId,
        out: &mut Self::Output,
        payload: &[u8],
    ) -> Result<(), DecodeError>;
}

/// Decoder for plain property replies.
pub struct PropertyParser;

impl ReplyDecoder for PropertyParser {
    type Output = i32;

    fn bus_id(device: DeviceId) -> BusId {
        BusId::from_group(device.get(), GROUP_PROPERTY)
    }

    fn parse(
        _device: DeviceId,
        property: PropertyId,
        out: &mut i32,
        payload: &[u8],
    ) -> Result<(), DecodeError> {
        if payload.len() < MIN_PROPERTY_REPLY_LEN {
            return Err(DecodeError::BadLength {
                expected: MIN_PROPERTY_REPLY_LEN,
                actual: payload.len(),
            });
        }
        if payload.len() > MAX_PROPERTY_REPLY_LEN {
            return Err(DecodeError::BadLength {
                expected: MAX_PROPERTY_REPLY_LEN,
                actual: payload.len(),
            });
        }
        let actual = payload[0] & PROPERTY_MASK;
        if actual != property.get() {
            return Err(DecodeError::PropertyMismatch {
                expected: property.get(),
                actual,
            });
        }

        // Little-endian value, sign-extended from its most significant byte.
        let value_bytes = &payload[2..];
        let mut raw: u32 = 0;
        for (i, &b) in value_bytes.iter().enumerate() {
            raw |= (b as u32) << (8 * i);
        }
        let unused = 32 - 8 * value_bytes.len() as u32;
        *out = ((raw << unused) as i32) >> unused;
        Ok(())
    }
}

// ── Frame builders ────────────────────────────────────────────────────────────

pub fn encode_get(property: PropertyId) -> [u8; 1] {
    [property.get() & PROPERTY_MASK]
}

pub fn encode_set(property: PropertyId, value: i32) -> [u8; 6] {
    let v = value.to_le_bytes();
    [SET_FLAG | property.get(), 0, v[0], v[1], v[2], v[3]]
}

// ── DeviceProtocol ────────────────────────────────────────────────────────────

/// Request/reply operations for devices sharing one bus.
pub struct DeviceProtocol<B: ?Sized> {
    bus: Arc<B>,
}

impl<B: ?Sized> Clone for DeviceProtocol<B> {
    fn clone(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<B: BusTransport + ?Sized> DeviceProtocol<B> {
    pub fn new(bus: Arc<B>) -> Self {
        Self { bus }
    }

    /// Ask `device` to send the current value of `property`.
    pub fn send_get_request(&self, device: DeviceId, property: PropertyId) -> Result<(), ProtocolError> {
        trace!(%device, property = property.get(), "get request");
        self.bus
            .send(BusId::to_device(device.get()), &encode_get(property))
            .map_err(|code| ProtocolError::Transport {
                op: "send_get_request",
                device: device.get(),
                code,
            })
    }

    /// Write `value` to `property` on `device`.
    pub fn set_property(
        &self,
        device: DeviceId,
        property: PropertyId,
        value: i32,
    ) -> Result<(), ProtocolError> {
        trace!(%device, property = property.get(), value, "set property");
        self.bus
            .send(BusId::to_device(device.get()), &encode_set(property, value))
            .map_err(|code| ProtocolError::Transport {
                op: "set_property",
                device: device.get(),
                code,
            })
    }

    /// Wait for one reply on `D::bus_id(device)` and decode it into `out`.
    ///
    /// `realtime` selects the transport's bounded receive path.
    pub fn receive_reply<D: ReplyDecoder>(
        &self,
        device: DeviceId,
        property: PropertyId,
        out: &mut D::Output,
        realtime: bool,
    ) -> Result<(), ProtocolError> {
        let frame = self
            .bus
            .receive(D::bus_id(device), realtime)
            .map_err(|code| ProtocolError::Transport {
                op: "receive_reply",
                device: device.get(),
                code,
            })?;

        D::parse(device, property, out, frame.payload()).map_err(|source| ProtocolError::Parse {
            op: "receive_reply",
            device: device.get(),
            property: property.get(),
            source,
        })
    }

    /// Read `property` from `device` (request + reply).
    pub fn get_property(
        &self,
        device: DeviceId,
        property: PropertyId,
        realtime: bool,
    ) -> Result<i32, ProtocolError> {
        self.send_get_request(device, property)?;
        let mut value = 0;
        self.receive_reply::<PropertyParser>(device, property, &mut value, realtime)?;
        Ok(value)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::loopback::LoopbackBus;
    use crate::bus::BusCode;

    fn dev(id: u8) -> DeviceId {
        DeviceId::new(id).unwrap()
    }

    fn prop(id: u8) -> PropertyId {
        PropertyId::new(id).unwrap()
    }

    #[test]
    fn identifiers_are_range_checked() {
        assert!(matches!(DeviceId::new(0), Err(ProtocolError::InvalidDevice(0))));
        assert!(matches!(DeviceId::new(32), Err(ProtocolError::InvalidDevice(32))));
        assert_eq!(DeviceId::new(31).unwrap().get(), 31);
        assert!(matches!(PropertyId::new(128), Err(ProtocolError::InvalidProperty(128))));
        assert_eq!(PropertyId::new(127).unwrap().get(), 127);
    }

    #[test]
    fn set_frame_layout() {
        assert_eq!(
            encode_set(prop(106), 0x0102_0304),
            [0x80 | 106, 0x00, 0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(encode_get(prop(106)), [106]);
    }

    #[test]
    fn property_reply_sign_extends_short_values() {
        let mut v = 0;
        PropertyParser::parse(dev(1), prop(107), &mut v, &[107, 0, 0xFE]).unwrap();
        assert_eq!(v, -2);
        PropertyParser::parse(dev(1), prop(107), &mut v, &[107, 0, 0xFE, 0xFF]).unwrap();
        assert_eq!(v, -2);
        PropertyParser::parse(dev(1), prop(107), &mut v, &[107, 0, 0x2C, 0x01]).unwrap();
        assert_eq!(v, 300);
        PropertyParser::parse(dev(1), prop(5), &mut v, &[0x80 | 5, 0, 1, 0, 0, 0]).unwrap();
        assert_eq!(v, 1);
    }

    #[test]
    fn property_reply_rejects_wrong_property_and_short_frames() {
        let mut v = 42;
        assert_eq!(
            PropertyParser::parse(dev(1), prop(7), &mut v, &[8, 0, 1]),
            Err(DecodeError::PropertyMismatch { expected: 7, actual: 8 })
        );
        assert_eq!(
            PropertyParser::parse(dev(1), prop(7), &mut v, &[7, 0]),
            Err(DecodeError::BadLength { expected: 3, actual: 2 })
        );
        assert_eq!(
            PropertyParser::parse(dev(1), prop(7), &mut v, &[7, 0, 1, 2, 3, 4, 5]),
            Err(DecodeError::BadLength { expected: 6, actual: 7 })
        );
        assert_eq!(v, 42, "failed parse must not touch the output");
    }

    #[test]
    fn requests_go_to_the_device_address() {
        let bus = Arc::new(LoopbackBus::new().with_send_log());
        let proto = DeviceProtocol::new(Arc::clone(&bus));

        proto.send_get_request(dev(11), prop(106)).unwrap();
        proto.set_property(dev(11), prop(106), 2).unwrap();

        let sent = bus.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|s| s.bus_id == BusId::to_device(11)));
        assert_eq!(sent[0].frame.payload(), &[106]);
        assert_eq!(sent[1].frame.payload(), &[0x80 | 106, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn get_property_round_trip_through_reply_group() {
        let bus = Arc::new(LoopbackBus::new());
        let proto = DeviceProtocol::new(Arc::clone(&bus));
        bus.inject(PropertyParser::bus_id(dev(3)), &[9, 0, 0x10, 0x00]).unwrap();

        assert_eq!(proto.get_property(dev(3), prop(9), true).unwrap(), 16);
    }

    #[test]
    fn transport_failure_is_reported_with_code() {
        let bus = Arc::new(LoopbackBus::new());
        let proto = DeviceProtocol::new(Arc::clone(&bus));

        let mut v = 0;
        let err = proto
            .receive_reply::<PropertyParser>(dev(4), prop(1), &mut v, true)
            .unwrap_err();
        assert_eq!(err.bus_code(), Some(BusCode::TIMED_OUT));

        bus.close();
        let err = proto.set_property(dev(4), prop(1), 0).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Transport { op: "set_property", device: 4, code: BusCode::CLOSED }
        ));
    }

    #[test]
    fn decoder_failure_is_a_parse_error() {
        let bus = Arc::new(LoopbackBus::new());
        let proto = DeviceProtocol::new(Arc::clone(&bus));
        bus.inject(PropertyParser::bus_id(dev(2)), &[1]).unwrap();

        let mut v = 0;
        let err = proto
            .receive_reply::<PropertyParser>(dev(2), prop(1), &mut v, true)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Parse { device: 2, property: 1, .. }));
        assert_eq!(err.bus_code(), None);
    }
}
