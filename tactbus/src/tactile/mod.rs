/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! 24-cell tactile sensor array: wire codecs, per-device driver and a
//! simulated device.
//!
//! ```text
//! caller ──request──►  TactilePuck  ──set/get TACT──►  DeviceProtocol ──► bus
//!        ◄─pressure──  (mode state)  ◄──codec──────── replies on FULL / TOP10 group
//! ```
//!
//! # Reporting modes
//!
//! The device streams in the format selected by its `TACT` property. The
//! driver mirrors that property locally so it knows whether the next request
//! has to switch the mode or can simply ask for the next sample. Every
//! decision is made by [`TactMode::on_request`]:
//!
//! | Current | Request | Next | Effect |
//! |---|---|---|---|
//! | `Full` | `Full` | `Full` | [`Effect::Fetch`] |
//! | any other | `Full` | `Full` | [`Effect::Write`]`(Full)` |
//! | `Top10` | `Top10` | `Top10` | [`Effect::Fetch`] |
//! | any other | `Top10` | `Top10` | [`Effect::Write`]`(Top10)` |
//! | any | `Tare` | unchanged | [`Effect::Write`]`(Tare)` |
//!
//! `Tare` zeroes the sensors. It is a one-shot command and never becomes the
//! local mode.

pub mod codec;
pub mod driver;
pub mod error;
pub mod sim;

pub use codec::{FullSample, FullTactParser, Top10TactParser};
pub use driver::TactilePuck;
pub use error::TactileError;

use serde::Deserialize;

use crate::protocol::PropertyId;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Cells in one sensor array.
pub const NUM_SENSORS: usize = 24;

/// `TACTID` value reported by a sensor whose hardware failed to initialise.
pub const TACTID_INIT_ERROR: i32 = -2;

/// Default `TACT` / `TACTID` property numbers.
pub const DEFAULT_TACT_PROPERTY: u8 = 106;
pub const DEFAULT_TACTID_PROPERTY: u8 = 107;

/// One pressure reading per cell, in physical cell order.
pub type PressureVector = [f64; NUM_SENSORS];

// ── Mode state machine ────────────────────────────────────────────────────────

/// Value of the `TACT` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TactMode {
    None = 0,
    Top10 = 1,
    Full = 2,
    Tare = 3,
}

/// What a caller asks the driver to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TactRequest {
    Full,
    Top10,
    Tare,
}

/// Bus action produced by one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Read `TACT`: the device answers with a fresh sample in its current mode.
    Fetch,
    /// Write `TACT`: switch the device's mode or issue a tare.
    Write(TactMode),
}

impl TactMode {
    pub fn wire_value(self) -> i32 {
        self as i32
    }

    pub fn from_wire(value: i32) -> Option<TactMode> {
        match value {
            0 => Some(TactMode::None),
            1 => Some(TactMode::Top10),
            2 => Some(TactMode::Full),
            3 => Some(TactMode::Tare),
            _ => None,
        }
    }

    /// Transition table. Returns the next local mode and the bus action.
    pub fn on_request(self, request: TactRequest) -> (TactMode, Effect) {
        match (self, request) {
            (TactMode::Full, TactRequest::Full) => (TactMode::Full, Effect::Fetch),
            (_, TactRequest::Full) => (TactMode::Full, Effect::Write(TactMode::Full)),
            (TactMode::Top10, TactRequest::Top10) => (TactMode::Top10, Effect::Fetch),
            (_, TactRequest::Top10) => (TactMode::Top10, Effect::Write(TactMode::Top10)),
            (current, TactRequest::Tare) => (current, Effect::Write(TactMode::Tare)),
        }
    }
}

// ── Configuration-facing types ────────────────────────────────────────────────

/// Streaming format a polling loop asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TactFormat {
    #[default]
    Full,
    Top10,
}

impl std::str::FromStr for TactFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(TactFormat::Full),
            "top10" => Ok(TactFormat::Top10),
            other => Err(format!("unknown tactile format '{other}' (valid: full, top10)")),
        }
    }
}

/// Property numbers of the tactile channel. Firmware-dependent, fixed once a
/// device is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TactProperties {
    pub tact: PropertyId,
    pub tactid: PropertyId,
}

impl Default for TactProperties {
    fn default() -> Self {
        Self {
            tact: PropertyId::masked(DEFAULT_TACT_PROPERTY),
            tactid: PropertyId::masked(DEFAULT_TACTID_PROPERTY),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: [TactMode; 4] = [TactMode::None, TactMode::Top10, TactMode::Full, TactMode::Tare];

    #[test]
    fn repeating_a_mode_fetches() {
        assert_eq!(TactMode::Full.on_request(TactRequest::Full), (TactMode::Full, Effect::Fetch));
        assert_eq!(TactMode::Top10.on_request(TactRequest::Top10), (TactMode::Top10, Effect::Fetch));
    }

    #[test]
    fn changing_mode_writes_the_new_mode() {
        assert_eq!(
            TactMode::None.on_request(TactRequest::Full),
            (TactMode::Full, Effect::Write(TactMode::Full))
        );
        assert_eq!(
            TactMode::Full.on_request(TactRequest::Top10),
            (TactMode::Top10, Effect::Write(TactMode::Top10))
        );
        assert_eq!(
            TactMode::Top10.on_request(TactRequest::Full),
            (TactMode::Full, Effect::Write(TactMode::Full))
        );
    }

    #[test]
    fn tare_always_writes_and_never_changes_local_mode() {
        for mode in ALL_MODES {
            assert_eq!(
                mode.on_request(TactRequest::Tare),
                (mode, Effect::Write(TactMode::Tare))
            );
        }
    }

    #[test]
    fn wire_values_match_property_encoding() {
        for mode in ALL_MODES {
            assert_eq!(TactMode::from_wire(mode.wire_value()), Some(mode));
        }
        assert_eq!(TactMode::Full.wire_value(), 2);
        assert_eq!(TactMode::from_wire(4), None);
        assert_eq!(TactMode::from_wire(-1), None);
    }

    #[test]
    fn format_parses_cli_names() {
        assert_eq!("full".parse::<TactFormat>().unwrap(), TactFormat::Full);
        assert_eq!("top10".parse::<TactFormat>().unwrap(), TactFormat::Top10);
        assert!("sparse".parse::<TactFormat>().is_err());
    }
}
