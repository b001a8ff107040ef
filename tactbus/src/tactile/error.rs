/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use thiserror::Error;

use crate::protocol::ProtocolError;

#[derive(Debug, Error)]
pub enum TactileError {
    /// The sensor reported an initialisation failure through `TACTID`.
    /// No driver is produced for the device.
    #[error("tactile sensor on ID={device} failed to initialize (TACTID = {tactid})")]
    InitFailed { device: u8, tactid: i32 },

    #[error("{op}: request to ID={device} failed: {source}")]
    Request {
        op: &'static str,
        device: u8,
        #[source]
        source: ProtocolError,
    },

    /// Receive `message` of `of` failed; the stored pressure vector is unchanged.
    #[error("{op}: message {message} of {of} from ID={device} failed: {source}")]
    Receive {
        op: &'static str,
        device: u8,
        message: usize,
        of: usize,
        #[source]
        source: ProtocolError,
    },

    /// Every Full message decoded, but some sequence numbers were repeated
    /// and others never arrived.
    #[error("incomplete full sample from ID={device} (sequence mask {seen_mask:#07b})")]
    IncompleteSample { device: u8, seen_mask: u8 },
}

impl TactileError {
    pub fn device(&self) -> u8 {
        match self {
            TactileError::InitFailed { device, .. }
            | TactileError::Request { device, .. }
            | TactileError::Receive { device, .. }
            | TactileError::IncompleteSample { device, .. } => *device,
        }
    }
}
