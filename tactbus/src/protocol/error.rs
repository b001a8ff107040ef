/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Error types for the device request/reply protocol.
//!
//! Two layers, mirroring how a reply is handled:
//!
//! * [`DecodeError`]: a payload did not have the expected shape. Produced
//!   by [`ReplyDecoder`](super::ReplyDecoder) implementations and the tactile
//!   codecs; carries expected-vs-actual values.
//! * [`ProtocolError`]: what a protocol operation returns. Names the
//!   operation and device so the caller can log it without extra context.
//!
//! Nothing here is retried. Every variant is fatal to the call that raised it.

use thiserror::Error;

use crate::bus::BusCode;

/// Why a payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected message length of {expected}, got message length of {actual}")]
    BadLength { expected: usize, actual: usize },

    /// Full-format sequence number outside `0..=4`.
    #[error("invalid sequence number: {0}")]
    BadSequence(u8),

    /// A property reply answered a different property than the one requested.
    #[error("reply is for property {actual}, expected property {expected}")]
    PropertyMismatch { expected: u8, actual: u8 },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Device ids are 5-bit and `0` is the host.
    #[error("invalid device id {0} (valid: 1..=31)")]
    InvalidDevice(u8),

    /// Property ids are 7-bit.
    #[error("invalid property id {0} (valid: 0..=127)")]
    InvalidProperty(u8),

    /// The bus transport reported a non-zero status.
    #[error("{op}: transport failure for ID={device}: {code}")]
    Transport {
        op: &'static str,
        device: u8,
        code: BusCode,
    },

    /// A reply arrived but the decoder rejected it.
    #[error("{op}: cannot parse reply from ID={device} (property {property}): {source}")]
    Parse {
        op: &'static str,
        device: u8,
        property: u8,
        #[source]
        source: DecodeError,
    },
}

impl ProtocolError {
    /// The transport status, when the failure came from the bus.
    pub fn bus_code(&self) -> Option<BusCode> {
        match self {
            ProtocolError::Transport { code, .. } => Some(*code),
            _ => None,
        }
    }
}
