/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Simulated tactile sensor for the loopback bus.
//!
//! Behaves like the firmware as seen from the host:
//!
//! | Frame received | Reaction |
//! |---|---|
//! | get `TACTID` | property reply with the configured id |
//! | set `TACT = Full / Top10` | switch mode, stream one sample |
//! | set `TACT = None` | switch mode |
//! | set `TACT = Tare` | count the tare, mode unchanged |
//! | get `TACT` in Full / Top10 | stream one sample |
//! | get `TACT` otherwise | property reply with the mode value |
//!
//! The encoders here are the inverse of [`super::codec`] up to quantisation.

use std::any::Any;

use tracing::trace;

use crate::bus::loopback::SimDevice;
use crate::bus::{BusId, Frame, GROUP_PROPERTY, GROUP_TACT_FULL, GROUP_TACT_TOP10};
use crate::protocol::{DeviceId, PROPERTY_MASK, SET_FLAG};

use super::codec::{
    FULL_SCALE_FACTOR, NUM_FULL_MESSAGES, NUM_SENSORS_PER_FULL_MESSAGE, TACT_PAYLOAD_LEN,
    TOP10_NIBBLES,
};
use super::{PressureVector, TactMode, TactProperties, NUM_SENSORS, TACTID_INIT_ERROR};

const FULL_MAX_RAW: f64 = 4095.0;
const TOP10_MAX_LEVEL: f64 = 15.0;

/// Firmware id reported by a healthy simulated sensor.
pub const SIM_TACTID: i32 = 1;

// ── Encoders ──────────────────────────────────────────────────────────────────

/// Encode `sample` as the five Full messages, in sequence order.
pub fn encode_full(sample: &PressureVector) -> [[u8; TACT_PAYLOAD_LEN]; NUM_FULL_MESSAGES] {
    let quantize = |v: f64| (v * FULL_SCALE_FACTOR).round().clamp(0.0, FULL_MAX_RAW) as u16;

    let mut messages = [[0u8; TACT_PAYLOAD_LEN]; NUM_FULL_MESSAGES];
    for (seq, msg) in messages.iter_mut().enumerate() {
        let base = seq * NUM_SENSORS_PER_FULL_MESSAGE;
        let mut v = [0u16; NUM_SENSORS_PER_FULL_MESSAGE];
        for (k, slot) in v.iter_mut().enumerate() {
            *slot = sample.get(base + k).copied().map_or(0, quantize);
        }

        *msg = [
            ((seq as u8) << 4) | (v[0] >> 8) as u8,
            v[0] as u8,
            (v[1] >> 4) as u8,
            ((v[1] as u8 & 0x0F) << 4) | (v[2] >> 8) as u8,
            v[2] as u8,
            (v[3] >> 4) as u8,
            ((v[3] as u8 & 0x0F) << 4) | (v[4] >> 8) as u8,
            v[4] as u8,
        ];
    }
    messages
}

/// Encode the ten strongest non-zero cells of `sample` as one Top10 message.
/// Readings are rounded and clamped to `0..=15`; ties go to the lower cell.
pub fn encode_top10(sample: &PressureVector) -> [u8; TACT_PAYLOAD_LEN] {
    let levels: Vec<u64> = sample
        .iter()
        .map(|v| v.round().clamp(0.0, TOP10_MAX_LEVEL) as u64)
        .collect();

    let mut chosen: Vec<usize> = (0..NUM_SENSORS).filter(|&i| levels[i] > 0).collect();
    chosen.sort_by(|&a, &b| levels[b].cmp(&levels[a]).then(a.cmp(&b)));
    chosen.truncate(TOP10_NIBBLES);
    chosen.sort_unstable();

    let mut word = 0u64;
    for (k, &cell) in chosen.iter().enumerate() {
        word |= 1 << (63 - cell);
        word |= levels[cell] << (36 - 4 * k);
    }
    word.to_be_bytes()
}

// ── SimTactilePuck ────────────────────────────────────────────────────────────

pub struct SimTactilePuck {
    id: DeviceId,
    properties: TactProperties,
    tactid: i32,
    mode: TactMode,
    sample: PressureVector,
    full_order: [u8; NUM_FULL_MESSAGES],
    tares: usize,
    mode_writes: usize,
}

impl SimTactilePuck {
    pub fn new(id: DeviceId, properties: TactProperties) -> Self {
        Self {
            id,
            properties,
            tactid: SIM_TACTID,
            mode: TactMode::None,
            sample: [0.0; NUM_SENSORS],
            full_order: [0, 1, 2, 3, 4],
            tares: 0,
            mode_writes: 0,
        }
    }

    /// Report the hardware-initialisation failure id on `TACTID` reads.
    pub fn failing_init(mut self) -> Self {
        self.tactid = TACTID_INIT_ERROR;
        self
    }

    /// Sequence numbers to emit for each Full sample, in emission order.
    /// Repeats are allowed, which produces an incomplete sample.
    pub fn with_full_order(mut self, order: [u8; NUM_FULL_MESSAGES]) -> Self {
        self.full_order = order;
        self
    }

    pub fn set_sample(&mut self, sample: PressureVector) {
        self.sample = sample;
    }

    pub fn sample(&self) -> &PressureVector {
        &self.sample
    }

    pub fn mode(&self) -> TactMode {
        self.mode
    }

    pub fn tare_count(&self) -> usize {
        self.tares
    }

    /// `TACT` writes that changed (or re-set) the reporting mode.
    pub fn mode_writes(&self) -> usize {
        self.mode_writes
    }

    fn push(replies: &mut Vec<(BusId, Frame)>, bus_id: BusId, payload: &[u8]) {
        if let Some(frame) = Frame::new(payload) {
            replies.push((bus_id, frame));
        }
    }

    fn reply_property(&self, property: u8, value: i32, replies: &mut Vec<(BusId, Frame)>) {
        let v = value.to_le_bytes();
        Self::push(
            replies,
            BusId::from_group(self.id.get(), GROUP_PROPERTY),
            &[property, 0, v[0], v[1], v[2], v[3]],
        );
    }

    fn stream(&self, replies: &mut Vec<(BusId, Frame)>) {
        match self.mode {
            TactMode::Full => {
                let messages = encode_full(&self.sample);
                let bus_id = BusId::from_group(self.id.get(), GROUP_TACT_FULL);
                for &seq in &self.full_order {
                    if let Some(msg) = messages.get(seq as usize) {
                        Self::push(replies, bus_id, msg);
                    }
                }
            }
            TactMode::Top10 => Self::push(
                replies,
                BusId::from_group(self.id.get(), GROUP_TACT_TOP10),
                &encode_top10(&self.sample),
            ),
            TactMode::None | TactMode::Tare => {}
        }
    }

    fn on_tact_write(&mut self, value: i32, replies: &mut Vec<(BusId, Frame)>) {
        match TactMode::from_wire(value) {
            Some(TactMode::Tare) => self.tares += 1,
            Some(mode) => {
                self.mode = mode;
                self.mode_writes += 1;
                self.stream(replies);
            }
            None => trace!(device = self.id.get(), value, "ignoring unknown TACT value"),
        }
    }
}

impl SimDevice for SimTactilePuck {
    fn on_frame(&mut self, payload: &[u8], replies: &mut Vec<(BusId, Frame)>) {
        let Some(&head) = payload.first() else {
            return;
        };
        let property = head & PROPERTY_MASK;
        let tact = self.properties.tact.get();

        if head & SET_FLAG != 0 {
            if property == tact && payload.len() == 6 {
                let value = i32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]);
                self.on_tact_write(value, replies);
            }
        } else if property == self.properties.tactid.get() {
            self.reply_property(property, self.tactid, replies);
        } else if property == tact {
            match self.mode {
                TactMode::Full | TactMode::Top10 => self.stream(replies),
                _ => self.reply_property(property, self.mode.wire_value(), replies),
            }
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
