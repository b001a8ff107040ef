/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Tactile payload decoders.
//!
//! Both formats arrive as exactly 8 bytes. Decoders validate the whole
//! payload before touching the output, so a rejected frame leaves every cell
//! as it was.
//!
//! # Full
//!
//! Five messages per sample, each carrying a 4-bit sequence number and five
//! 12-bit readings scaled by `1/256`:
//!
//! ```text
//! byte:   0          1    2    3          4    5    6          7
//!        [seq|c0.hi] [c0.lo] [c1.hi] [c1.lo|c2.hi] [c2.lo] [c3.hi] [c3.lo|c4.hi] [c4.lo]
//! ```
//!
//! Message `s` covers cells `5s ..= 5s+4`. The last message only has four
//! cells; its fifth slot is ignored.
//!
//! # Top10
//!
//! One message. Read as a big-endian `u64`: the top 24 bits are a cell bitmap
//! (bit 63 = cell 0, bit 40 = cell 23), the low 40 bits ten 4-bit readings.
//! Set cells take the next reading in ascending cell order, clear cells read 0.

use crate::bus::{BusId, GROUP_TACT_FULL, GROUP_TACT_TOP10};
use crate::protocol::{DecodeError, DeviceId, PropertyId, ReplyDecoder};

use super::{PressureVector, NUM_SENSORS};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Length of every tactile payload.
pub const TACT_PAYLOAD_LEN: usize = 8;

pub const NUM_FULL_MESSAGES: usize = 5;
pub const NUM_SENSORS_PER_FULL_MESSAGE: usize = 5;

/// Full-format readings are fixed-point with 8 fractional bits.
pub const FULL_SCALE_FACTOR: f64 = 256.0;

/// Readings carried by one Top10 message.
pub const TOP10_NIBBLES: usize = 10;

const TOP10_BITMAP_BITS: u32 = NUM_SENSORS as u32;

/// Seen-mask value once every Full sequence number has arrived.
const FULL_SEEN_ALL: u8 = (1 << NUM_FULL_MESSAGES) - 1;

fn check_len(payload: &[u8]) -> Result<(), DecodeError> {
    if payload.len() != TACT_PAYLOAD_LEN {
        return Err(DecodeError::BadLength {
            expected: TACT_PAYLOAD_LEN,
            actual: payload.len(),
        });
    }
    Ok(())
}

// ── Full ──────────────────────────────────────────────────────────────────────

/// Decode one Full message into its five cells. Returns the sequence number.
pub fn decode_full(payload: &[u8], cells: &mut PressureVector) -> Result<u8, DecodeError> {
    check_len(payload)?;
    let seq = payload[0] >> 4;
    if seq as usize >= NUM_FULL_MESSAGES {
        return Err(DecodeError::BadSequence(seq));
    }

    let b = payload;
    let raw: [u16; NUM_SENSORS_PER_FULL_MESSAGE] = [
        ((b[0] as u16 & 0x0F) << 8) | b[1] as u16,
        ((b[2] as u16) << 4) | ((b[3] as u16 & 0xF0) >> 4),
        ((b[3] as u16 & 0x0F) << 8) | b[4] as u16,
        ((b[5] as u16) << 4) | ((b[6] as u16 & 0xF0) >> 4),
        ((b[6] as u16 & 0x0F) << 8) | b[7] as u16,
    ];

    let base = seq as usize * NUM_SENSORS_PER_FULL_MESSAGE;
    for (offset, value) in raw.iter().enumerate() {
        // final message: slot 4 has no cell
        if let Some(cell) = cells.get_mut(base + offset) {
            *cell = *value as f64 / FULL_SCALE_FACTOR;
        }
    }
    Ok(seq)
}

/// Accumulator for the five messages of one Full sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FullSample {
    pub cells: PressureVector,
    seen: u8,
}

impl Default for FullSample {
    fn default() -> Self {
        Self {
            cells: [0.0; NUM_SENSORS],
            seen: 0,
        }
    }
}

impl FullSample {
    /// Start from existing readings; cells of messages that never arrive keep
    /// these values.
    pub fn from_cells(cells: PressureVector) -> Self {
        Self { cells, seen: 0 }
    }

    /// Bit `s` set once message `s` was decoded.
    pub fn seen_mask(&self) -> u8 {
        self.seen
    }

    pub fn is_complete(&self) -> bool {
        self.seen == FULL_SEEN_ALL
    }
}

/// [`ReplyDecoder`] for Full messages on [`GROUP_TACT_FULL`].
pub struct FullTactParser;

impl ReplyDecoder for FullTactParser {
    type Output = FullSample;

    fn bus_id(device: DeviceId) -> BusId {
        BusId::from_group(device.get(), GROUP_TACT_FULL)
    }

    fn parse(
        _device: DeviceId,
        _property: PropertyId,
        out: &mut FullSample,
        payload: &[u8],
    ) -> Result<(), DecodeError> {
        let seq = decode_full(payload, &mut out.cells)?;
        out.seen |= 1 << seq;
        Ok(())
    }
}

// ── Top10 ─────────────────────────────────────────────────────────────────────

/// Decode one Top10 message, overwriting all 24 cells. Returns the number of
/// readings consumed.
pub fn decode_top10(payload: &[u8], cells: &mut PressureVector) -> Result<usize, DecodeError> {
    check_len(payload)?;
    let mut word = [0u8; TACT_PAYLOAD_LEN];
    word.copy_from_slice(payload);
    let word = u64::from_be_bytes(word);

    let bitmap = word >> (64 - TOP10_BITMAP_BITS);
    let mut nibbles = word << TOP10_BITMAP_BITS;
    let mut consumed = 0;

    for (cell, out) in cells.iter_mut().enumerate() {
        let bit = TOP10_BITMAP_BITS - 1 - cell as u32;
        *out = 0.0;
        if (bitmap >> bit) & 1 == 1 && consumed < TOP10_NIBBLES {
            *out = (nibbles >> 60) as f64;
            nibbles <<= 4;
            consumed += 1;
        }
    }
    Ok(consumed)
}

/// [`ReplyDecoder`] for Top10 messages on [`GROUP_TACT_TOP10`].
pub struct Top10TactParser;

impl ReplyDecoder for Top10TactParser {
    type Output = PressureVector;

    fn bus_id(device: DeviceId) -> BusId {
        BusId::from_group(device.get(), GROUP_TACT_TOP10)
    }

    fn parse(
        _device: DeviceId,
        _property: PropertyId,
        out: &mut PressureVector,
        payload: &[u8],
    ) -> Result<(), DecodeError> {
        decode_top10(payload, out).map(|_| ())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: f64 = -1.0;

    fn full_message(seq: u8) -> [u8; 8] {
        [seq << 4, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE]
    }

    #[test]
    fn full_scenario_decodes_five_twelve_bit_cells() {
        let mut cells = [SENTINEL; NUM_SENSORS];
        let seq = decode_full(&[0x00, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE], &mut cells).unwrap();

        assert_eq!(seq, 0);
        assert_eq!(cells[0], 0x012 as f64 / 256.0);
        assert_eq!(cells[1], 0x345 as f64 / 256.0);
        assert_eq!(cells[2], 0x678 as f64 / 256.0);
        assert_eq!(cells[3], 0x9AB as f64 / 256.0);
        assert_eq!(cells[4], 0xCDE as f64 / 256.0);
        assert!(cells[5..].iter().all(|&c| c == SENTINEL));
    }

    #[test]
    fn full_writes_only_its_own_block() {
        for seq in 0..NUM_FULL_MESSAGES as u8 {
            let mut cells = [SENTINEL; NUM_SENSORS];
            assert_eq!(decode_full(&full_message(seq), &mut cells).unwrap(), seq);

            let base = seq as usize * 5;
            for (i, &c) in cells.iter().enumerate() {
                let in_block = (base..base + 5).contains(&i);
                assert_eq!(c != SENTINEL, in_block, "seq {seq}, cell {i}");
            }
        }
    }

    #[test]
    fn full_final_message_ignores_fifth_slot() {
        let mut cells = [SENTINEL; NUM_SENSORS];
        decode_full(&full_message(4), &mut cells).unwrap();
        assert_eq!(cells[20], 0x012 as f64 / 256.0);
        assert_eq!(cells[23], 0x9AB as f64 / 256.0);
    }

    #[test]
    fn full_rejects_bad_length_for_every_sequence() {
        for seq in 0..16u8 {
            for len in [0usize, 7, 9] {
                let mut payload = vec![0u8; len];
                if let Some(first) = payload.first_mut() {
                    *first = seq << 4;
                }
                let mut cells = [SENTINEL; NUM_SENSORS];
                assert_eq!(
                    decode_full(&payload, &mut cells),
                    Err(DecodeError::BadLength { expected: 8, actual: len })
                );
                assert!(cells.iter().all(|&c| c == SENTINEL));
            }
        }
    }

    #[test]
    fn full_rejects_sequence_above_four() {
        for seq in 5..16u8 {
            let mut cells = [SENTINEL; NUM_SENSORS];
            assert_eq!(
                decode_full(&full_message(seq), &mut cells),
                Err(DecodeError::BadSequence(seq))
            );
            assert!(cells.iter().all(|&c| c == SENTINEL));
        }
    }

    #[test]
    fn full_sample_tracks_sequence_numbers() {
        let dev = DeviceId::new(1).unwrap();
        let prop = PropertyId::new(106).unwrap();
        let mut sample = FullSample::default();

        for seq in [3u8, 0, 4, 1] {
            FullTactParser::parse(dev, prop, &mut sample, &full_message(seq)).unwrap();
        }
        assert_eq!(sample.seen_mask(), 0b11011);
        assert!(!sample.is_complete());

        FullTactParser::parse(dev, prop, &mut sample, &full_message(2)).unwrap();
        assert!(sample.is_complete());
    }

    #[test]
    fn top10_scenario_first_and_last_cell() {
        let mut cells = [SENTINEL; NUM_SENSORS];
        let consumed = decode_top10(&[0x80, 0x00, 0x01, 0xD3, 0, 0, 0, 0], &mut cells).unwrap();

        assert_eq!(consumed, 2);
        assert_eq!(cells[0], 13.0);
        assert_eq!(cells[23], 3.0);
        assert!(cells[1..23].iter().all(|&c| c == 0.0));
    }

    #[test]
    fn top10_consumes_one_nibble_per_set_bit() {
        // cells 2, 5, 9 with readings 1, 2, 3
        let bitmap: u64 = (1 << (23 - 2)) | (1 << (23 - 5)) | (1 << (23 - 9));
        let word = (bitmap << 40) | (0x123u64 << 28);
        let mut cells = [SENTINEL; NUM_SENSORS];

        assert_eq!(decode_top10(&word.to_be_bytes(), &mut cells).unwrap(), 3);
        assert_eq!(cells[2], 1.0);
        assert_eq!(cells[5], 2.0);
        assert_eq!(cells[9], 3.0);
        assert_eq!(cells.iter().filter(|&&c| c != 0.0).count(), 3);
    }

    #[test]
    fn top10_caps_consumption_at_ten_readings() {
        let word = (0xFF_FFFFu64 << 40) | 0xFF_FFFF_FFFF;
        let mut cells = [SENTINEL; NUM_SENSORS];

        assert_eq!(decode_top10(&word.to_be_bytes(), &mut cells).unwrap(), TOP10_NIBBLES);
        assert!(cells[..10].iter().all(|&c| c == 15.0));
        assert!(cells[10..].iter().all(|&c| c == 0.0));
    }

    #[test]
    fn top10_is_deterministic_and_length_checked() {
        let payload = [0xA5, 0x5A, 0x0F, 0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut a = [0.0; NUM_SENSORS];
        let mut b = [SENTINEL; NUM_SENSORS];
        decode_top10(&payload, &mut a).unwrap();
        decode_top10(&payload, &mut b).unwrap();
        assert_eq!(a, b);

        let mut cells = [SENTINEL; NUM_SENSORS];
        assert_eq!(
            decode_top10(&payload[..7], &mut cells),
            Err(DecodeError::BadLength { expected: 8, actual: 7 })
        );
        assert!(cells.iter().all(|&c| c == SENTINEL));
    }

    #[test]
    fn parsers_listen_on_their_groups() {
        let dev = DeviceId::new(11).unwrap();
        assert_eq!(FullTactParser::bus_id(dev), BusId::from_group(11, GROUP_TACT_FULL));
        assert_eq!(Top10TactParser::bus_id(dev), BusId::from_group(11, GROUP_TACT_TOP10));
    }
}
