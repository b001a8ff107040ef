/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-device tactile driver.
//!
//! A [`TactilePuck`] owns one device's tactile channel: the locally mirrored
//! `TACT` mode and the last committed pressure vector. Requests go through
//! [`TactMode::on_request`]; receives decode into a scratch copy and only
//! replace the stored vector once the whole sample has been read.
//!
//! The driver does no locking. One caller per device.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::bus::BusTransport;
use crate::protocol::{DeviceId, DeviceProtocol, ProtocolError};

use super::codec::{FullSample, FullTactParser, Top10TactParser, NUM_FULL_MESSAGES};
use super::error::TactileError;
use super::{
    Effect, PressureVector, TactFormat, TactMode, TactProperties, TactRequest, NUM_SENSORS,
    TACTID_INIT_ERROR,
};

pub struct TactilePuck<B: ?Sized> {
    protocol: DeviceProtocol<B>,
    device: DeviceId,
    properties: TactProperties,
    mode: TactMode,
    tactile: PressureVector,
}

impl<B: BusTransport + ?Sized> TactilePuck<B> {
    /// Bring up the tactile channel of `device`.
    ///
    /// Reads `TACTID` (best-effort receive), resets the device to
    /// [`TactMode::None`] and tares it.
    pub fn attach(bus: Arc<B>, device: DeviceId, properties: TactProperties) -> Result<Self, TactileError> {
        let protocol = DeviceProtocol::new(bus);

        let tactid = protocol
            .get_property(device, properties.tactid, false)
            .map_err(|source| TactileError::Request {
                op: "attach",
                device: device.get(),
                source,
            })?;
        if tactid == TACTID_INIT_ERROR {
            error!(device = device.get(), tactid, "tactile sensor failed to initialize");
            return Err(TactileError::InitFailed {
                device: device.get(),
                tactid,
            });
        }

        let mut puck = Self {
            protocol,
            device,
            properties,
            mode: TactMode::None,
            tactile: [0.0; NUM_SENSORS],
        };
        puck.write_tact(TactMode::None, "attach")?;
        puck.tare()?;

        info!(device = device.get(), tactid, "tactile sensor attached");
        Ok(puck)
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn mode(&self) -> TactMode {
        self.mode
    }

    /// Last committed pressure vector.
    pub fn tactile_data(&self) -> &PressureVector {
        &self.tactile
    }

    // ── Requests ──────────────────────────────────────────────────────────────

    pub fn request_full(&mut self) -> Result<(), TactileError> {
        self.apply(TactRequest::Full, "request_full")
    }

    pub fn request_top10(&mut self) -> Result<(), TactileError> {
        self.apply(TactRequest::Top10, "request_top10")
    }

    /// Zero the sensors. The reporting mode is left as it was.
    pub fn tare(&mut self) -> Result<(), TactileError> {
        self.apply(TactRequest::Tare, "tare")
    }

    fn apply(&mut self, request: TactRequest, op: &'static str) -> Result<(), TactileError> {
        let (next, effect) = self.mode.on_request(request);
        match effect {
            Effect::Fetch => self
                .protocol
                .send_get_request(self.device, self.properties.tact)
                .map_err(|source| self.request_error(op, source))?,
            Effect::Write(value) => self.write_tact(value, op)?,
        }

        if next != self.mode {
            debug!(device = self.device.get(), from = ?self.mode, to = ?next, "tactile mode switched");
            self.mode = next;
        }
        Ok(())
    }

    fn write_tact(&self, value: TactMode, op: &'static str) -> Result<(), TactileError> {
        self.protocol
            .set_property(self.device, self.properties.tact, value.wire_value())
            .map_err(|source| self.request_error(op, source))
    }

    fn request_error(&self, op: &'static str, source: ProtocolError) -> TactileError {
        TactileError::Request {
            op,
            device: self.device.get(),
            source,
        }
    }

    // ── Receives ──────────────────────────────────────────────────────────────

    /// Read the five messages of one Full sample.
    ///
    /// Cells are assigned by sequence number, so arrival order does not
    /// matter. The stored vector changes only if all five messages decode and
    /// every sequence number was seen.
    pub fn receive_full(&mut self, realtime: bool) -> Result<(), TactileError> {
        let mut sample = FullSample::from_cells(self.tactile);
        for i in 0..NUM_FULL_MESSAGES {
            self.protocol
                .receive_reply::<FullTactParser>(self.device, self.properties.tact, &mut sample, realtime)
                .map_err(|source| TactileError::Receive {
                    op: "receive_full",
                    device: self.device.get(),
                    message: i + 1,
                    of: NUM_FULL_MESSAGES,
                    source,
                })?;
        }

        if !sample.is_complete() {
            return Err(TactileError::IncompleteSample {
                device: self.device.get(),
                seen_mask: sample.seen_mask(),
            });
        }
        self.tactile = sample.cells;
        Ok(())
    }

    /// Read one Top10 message. Cells outside the reported ten become 0.
    pub fn receive_top10(&mut self, realtime: bool) -> Result<(), TactileError> {
        let mut cells = self.tactile;
        self.protocol
            .receive_reply::<Top10TactParser>(self.device, self.properties.tact, &mut cells, realtime)
            .map_err(|source| TactileError::Receive {
                op: "receive_top10",
                device: self.device.get(),
                message: 1,
                of: 1,
                source,
            })?;
        self.tactile = cells;
        Ok(())
    }

    // ── Convenience ───────────────────────────────────────────────────────────

    pub fn update_full(&mut self, realtime: bool) -> Result<&PressureVector, TactileError> {
        self.request_full()?;
        self.receive_full(realtime)?;
        Ok(&self.tactile)
    }

    pub fn update_top10(&mut self, realtime: bool) -> Result<&PressureVector, TactileError> {
        self.request_top10()?;
        self.receive_top10(realtime)?;
        Ok(&self.tactile)
    }

    /// Request and receive one sample in `format`.
    pub fn update(&mut self, format: TactFormat, realtime: bool) -> Result<&PressureVector, TactileError> {
        match format {
            TactFormat::Full => self.update_full(realtime),
            TactFormat::Top10 => self.update_top10(realtime),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::loopback::LoopbackBus;
    use crate::bus::{BusCode, BusId, GROUP_TACT_FULL};
    use crate::protocol::{encode_get, encode_set};
    use crate::tactile::sim::SimTactilePuck;

    const ID: u8 = 11;

    fn device() -> DeviceId {
        DeviceId::new(ID).unwrap()
    }

    fn bus_with(sim: SimTactilePuck) -> Arc<LoopbackBus> {
        let bus = Arc::new(LoopbackBus::new().with_send_log());
        bus.attach_device(ID, sim);
        bus
    }

    fn healthy_bus() -> Arc<LoopbackBus> {
        bus_with(SimTactilePuck::new(device(), TactProperties::default()))
    }

    fn sample() -> PressureVector {
        let mut s = [0.0; NUM_SENSORS];
        for (i, cell) in s.iter_mut().enumerate() {
            *cell = 1.0 + i as f64 * 0.25;
        }
        s
    }

    fn set_sample(bus: &LoopbackBus, s: PressureVector) {
        bus.with_device(ID, |p: &mut SimTactilePuck| p.set_sample(s)).unwrap();
    }

    #[test]
    fn attach_resets_mode_and_tares() {
        let bus = healthy_bus();
        let puck = TactilePuck::attach(Arc::clone(&bus), device(), TactProperties::default()).unwrap();

        assert_eq!(puck.mode(), TactMode::None);
        assert_eq!(puck.tactile_data(), &[0.0; NUM_SENSORS]);

        let props = TactProperties::default();
        let sent: Vec<_> = bus.sent().iter().map(|s| s.frame.payload().to_vec()).collect();
        assert_eq!(
            sent,
            vec![
                encode_get(props.tactid).to_vec(),
                encode_set(props.tact, TactMode::None.wire_value()).to_vec(),
                encode_set(props.tact, TactMode::Tare.wire_value()).to_vec(),
            ]
        );
        assert_eq!(bus.with_device(ID, |p: &mut SimTactilePuck| p.tare_count()), Some(1));
    }

    #[test]
    fn attach_fails_on_init_error_id() {
        let bus = bus_with(SimTactilePuck::new(device(), TactProperties::default()).failing_init());
        let err = TactilePuck::attach(Arc::clone(&bus), device(), TactProperties::default())
            .err()
            .unwrap();

        assert!(matches!(err, TactileError::InitFailed { device: ID, tactid: -2 }));
        // nothing written after the TACTID read
        assert_eq!(bus.sent().len(), 1);
    }

    #[test]
    fn request_full_twice_switches_once_then_fetches() {
        let bus = healthy_bus();
        let props = TactProperties::default();
        let mut puck = TactilePuck::attach(Arc::clone(&bus), device(), props).unwrap();
        bus.clear_sent();

        puck.request_full().unwrap();
        puck.request_full().unwrap();

        let sent = bus.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|s| s.bus_id == BusId::to_device(ID)));
        assert_eq!(sent[0].frame.payload(), &encode_set(props.tact, 2));
        assert_eq!(sent[1].frame.payload(), &encode_get(props.tact));
        assert_eq!(puck.mode(), TactMode::Full);
        // reset to None on attach, then the single switch to Full
        assert_eq!(bus.with_device(ID, |p: &mut SimTactilePuck| p.mode_writes()), Some(2));
    }

    #[test]
    fn tare_keeps_local_mode() {
        let bus = healthy_bus();
        let mut puck = TactilePuck::attach(Arc::clone(&bus), device(), TactProperties::default()).unwrap();
        puck.request_top10().unwrap();
        puck.tare().unwrap();
        assert_eq!(puck.mode(), TactMode::Top10);
        assert_eq!(bus.with_device(ID, |p: &mut SimTactilePuck| p.tare_count()), Some(2));
    }

    #[test]
    fn update_full_commits_a_complete_sample() {
        let bus = healthy_bus();
        let mut puck = TactilePuck::attach(Arc::clone(&bus), device(), TactProperties::default()).unwrap();
        set_sample(&bus, sample());

        assert_eq!(puck.update_full(true).unwrap(), &sample());
        // second round goes through the fetch path
        let mut next = sample();
        next[23] = 2.5;
        set_sample(&bus, next);
        assert_eq!(puck.update_full(true).unwrap(), &next);
    }

    #[test]
    fn full_cells_follow_sequence_numbers_not_arrival_order() {
        let sim = SimTactilePuck::new(device(), TactProperties::default()).with_full_order([4, 2, 0, 3, 1]);
        let bus = bus_with(sim);
        let mut puck = TactilePuck::attach(Arc::clone(&bus), device(), TactProperties::default()).unwrap();
        set_sample(&bus, sample());

        assert_eq!(puck.update_full(true).unwrap(), &sample());
    }

    #[test]
    fn repeated_sequence_is_an_incomplete_sample() {
        let sim = SimTactilePuck::new(device(), TactProperties::default()).with_full_order([0, 1, 2, 3, 3]);
        let bus = bus_with(sim);
        let mut puck = TactilePuck::attach(Arc::clone(&bus), device(), TactProperties::default()).unwrap();
        set_sample(&bus, sample());

        let err = puck.update_full(true).unwrap_err();
        assert!(matches!(err, TactileError::IncompleteSample { device: ID, seen_mask: 0b01111 }));
        assert_eq!(puck.tactile_data(), &[0.0; NUM_SENSORS]);
    }

    #[test]
    fn failed_full_receive_leaves_vector_unchanged() {
        let bus = healthy_bus();
        let mut puck = TactilePuck::attach(Arc::clone(&bus), device(), TactProperties::default()).unwrap();
        set_sample(&bus, sample());
        puck.update_full(true).unwrap();

        // two good messages, then a malformed one
        let full = BusId::from_group(ID, GROUP_TACT_FULL);
        bus.inject(full, &[0x00, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        bus.inject(full, &[0x10, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        bus.inject(full, &[0x70, 0, 0, 0, 0, 0, 0, 0]).unwrap();

        let err = puck.receive_full(true).unwrap_err();
        match err {
            TactileError::Receive { message, of, source, .. } => {
                assert_eq!((message, of), (3, 5));
                assert!(matches!(source, ProtocolError::Parse { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(puck.tactile_data(), &sample());
    }

    #[test]
    fn missing_message_times_out_on_realtime_path() {
        let bus = healthy_bus();
        let mut puck = TactilePuck::attach(Arc::clone(&bus), device(), TactProperties::default()).unwrap();

        let full = BusId::from_group(ID, GROUP_TACT_FULL);
        bus.inject(full, &[0x00, 0, 0, 0, 0, 0, 0, 0]).unwrap();

        let err = puck.receive_full(true).unwrap_err();
        match err {
            TactileError::Receive { message: 2, source, .. } => {
                assert_eq!(source.bus_code(), Some(BusCode::TIMED_OUT));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn update_top10_replaces_every_cell() {
        let bus = healthy_bus();
        let mut puck = TactilePuck::attach(Arc::clone(&bus), device(), TactProperties::default()).unwrap();
        set_sample(&bus, sample());
        puck.update_full(true).unwrap();

        let mut sparse = [0.0; NUM_SENSORS];
        sparse[0] = 13.0;
        sparse[23] = 3.0;
        set_sample(&bus, sparse);

        assert_eq!(puck.update(TactFormat::Top10, true).unwrap(), &sparse);
        assert_eq!(puck.mode(), TactMode::Top10);
    }

    #[test]
    fn closed_bus_reports_request_failure() {
        let bus = healthy_bus();
        let mut puck = TactilePuck::attach(Arc::clone(&bus), device(), TactProperties::default()).unwrap();
        bus.close();

        let err = puck.request_full().unwrap_err();
        assert!(matches!(err, TactileError::Request { op: "request_full", device: ID, .. }));
        assert_eq!(puck.mode(), TactMode::None, "failed switch must not change local mode");
    }
}
