//! Polling engine.
//!
//! One [`Engine::poll`] call runs a full cooperative cycle:
//!
//! 1. apply queued control requests,
//! 2. read whatever the transport has (bounded by `max_reads_per_poll`),
//! 3. for every complete frame: boundary filter, track update, publish,
//! 4. release all slots if the link has been silent for `link_timeout_ms`.
//!
//! Nothing in a poll blocks except sensor resets, which wait for the boot
//! prompt for a bounded time.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::time::Instant;

use iwr6843_hardware::{
    BootStatus, DecodeStats, FrameDecoder, SensorControl, TransportError, TransportPort,
};

use crate::boundary;
use crate::config::DriverConfig;
use crate::control::{self, ControlHandle, ControlRequest};
use crate::error::{ConfigError, DriverError};
use crate::parameter::Parameter;
use crate::publisher::{OutputChannel, OutputKind, Publisher};
use crate::tracking::{PersonSlot, SlotId, SlotSnapshot, TrackManager};

/// Running engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub polls: u64,
    pub frames: u64,
    pub read_errors: u64,
    pub link_losses: u64,
    /// Parameter updates refused by validation.
    pub rejected_updates: u64,
    /// Reset, flash-mode or track-allocation requests the sensor controller failed.
    pub control_failures: u64,
}

/// What one poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub bytes_read: usize,
    pub frames: usize,
    /// Channel invocations.
    pub published: usize,
    /// The link watchdog released the slots during this poll.
    pub link_lost: bool,
}

pub struct Engine<T, C> {
    config: DriverConfig,
    transport: T,
    decoder: FrameDecoder,
    tracker: TrackManager,
    publisher: Publisher<C>,
    sensor: Option<Box<dyn SensorControl>>,
    flash_mode: bool,
    tx: SyncSender<ControlRequest>,
    rx: Receiver<ControlRequest>,
    read_buf: Vec<u8>,
    last_frame_at: Option<Instant>,
    stats: EngineStats,
}

impl<T: TransportPort, C: OutputChannel> Engine<T, C> {
    /// Build an engine from a validated configuration.
    pub fn new(config: DriverConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, rx) = sync_channel(config.control_queue_capacity);
        Ok(Self {
            decoder: FrameDecoder::new(config.decoder),
            tracker: TrackManager::new(
                &config.component.slots,
                config.tracker.clone(),
                config.fall.clone(),
            ),
            publisher: Publisher::new(config.output_unit),
            read_buf: vec![0u8; config.read_chunk_size],
            config,
            transport,
            sensor: None,
            flash_mode: false,
            tx,
            rx,
            last_frame_at: None,
            stats: EngineStats::default(),
        })
    }

    /// Attach the reset / flash / command controller.
    pub fn with_sensor_control(mut self, sensor: Box<dyn SensorControl>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Log the configuration and bring the sensor up: control lines to
    /// functional mode, a reset, then the profile.
    pub fn setup(&mut self) -> Result<(), DriverError> {
        let c = &self.config.component;
        tracing::info!(
            ceiling_cm = c.ceiling_height,
            max_tracks = c.max_tracks,
            slots = c.slots.len(),
            unit = self.config.output_unit.symbol(),
            "Setting up IWR6843 presence engine"
        );
        tracing::info!(tracking = ?c.tracking_boundary, presence = ?c.presence_boundary, "Boundaries");

        let max_tracks = c.max_tracks;
        if let Some(sensor) = self.sensor.as_mut() {
            let status = sensor.start(max_tracks)?;
            tracing::info!(?status, "Sensor started");
        }
        self.flash_mode = false;
        Ok(())
    }

    /// Register an output channel for a declared slot.
    pub fn register_output(
        &mut self,
        slot: SlotId,
        kind: OutputKind,
        channel: C,
    ) -> Result<(), ConfigError> {
        if self.tracker.slot(slot).is_none() {
            return Err(ConfigError::invalid_value(
                "slots",
                format!("slot {slot} is not declared"),
            ));
        }
        self.publisher.register(slot, kind, channel);
        Ok(())
    }

    /// Handle for queuing requests from elsewhere.
    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle::new(self.tx.clone(), self.config.control_queue_capacity)
    }

    /// Validate and apply a parameter immediately.
    ///
    /// A `max_tracks` change is pushed to the sensor first; if that fails the
    /// error is returned and nothing changes. Lowering `max_tracks` releases
    /// the highest-numbered occupied slots and publishes the change.
    pub fn set_parameter(&mut self, parameter: Parameter, value: f32) -> Result<(), DriverError> {
        if let Err(e) = parameter.check(value, &self.config.component) {
            tracing::warn!(%parameter, value, error = %e, "Parameter update rejected");
            self.stats.rejected_updates += 1;
            return Err(e.into());
        }

        if parameter == Parameter::MaxTracks {
            if let Some(sensor) = self.sensor.as_mut() {
                if let Err(e) = sensor.apply_max_tracks(value as u8) {
                    tracing::warn!(%parameter, value, error = %e, "Sensor refused track allocation");
                    self.stats.control_failures += 1;
                    return Err(e.into());
                }
            }
        }

        parameter.apply(&mut self.config.component, value)?;
        tracing::info!(%parameter, value, "Parameter updated");

        if parameter == Parameter::MaxTracks {
            let max_tracks = self.config.component.max_tracks;
            if !self.tracker.enforce_max_tracks(max_tracks).is_empty() {
                self.publish();
            }
        }
        Ok(())
    }

    /// Current value of a parameter.
    pub fn parameter(&self, parameter: Parameter) -> f32 {
        parameter.read(&self.config.component)
    }

    /// Discard buffered bytes and reset the sensor. Slots keep their state and
    /// age out normally if the sensor stays silent.
    pub fn reset(&mut self) -> Result<Option<BootStatus>, DriverError> {
        tracing::info!(buffered = self.decoder.buffered(), "Reset requested");
        self.decoder.clear();
        self.flash_mode = false;
        let Some(sensor) = self.sensor.as_mut() else {
            return Ok(None);
        };
        match sensor.reset() {
            Ok(status) => Ok(Some(status)),
            Err(e) => {
                tracing::warn!(error = %e, "Sensor reset failed");
                self.stats.control_failures += 1;
                Err(e.into())
            }
        }
    }

    pub fn set_flash_mode(&mut self, enable: bool) -> Result<(), DriverError> {
        if let Some(sensor) = self.sensor.as_mut() {
            if let Err(e) = sensor.set_flash_mode(enable) {
                tracing::warn!(enabled = enable, error = %e, "Flash mode change failed");
                self.stats.control_failures += 1;
                return Err(e.into());
            }
        }
        self.flash_mode = enable;
        Ok(())
    }

    pub fn flash_mode(&self) -> bool {
        self.sensor
            .as_ref()
            .map_or(self.flash_mode, |sensor| sensor.flash_mode())
    }

    /// Publish the current value of every registered channel.
    pub fn publish_initial_state(&mut self) -> usize {
        let snapshots = self.tracker.snapshots();
        self.publisher.publish_initial_state(&snapshots)
    }

    /// Run one polling cycle.
    ///
    /// A transport read error ends the read phase; frames already buffered are
    /// still processed and the error is returned afterwards. The next poll
    /// reads again.
    pub fn poll(&mut self, now: Instant) -> Result<PollSummary, DriverError> {
        self.stats.polls += 1;
        self.apply_requests();

        let mut summary = PollSummary::default();
        let mut read_error: Option<TransportError> = None;

        for _ in 0..self.config.max_reads_per_poll {
            match self.transport.read_available(&mut self.read_buf) {
                Ok(0) => break,
                Ok(n) => {
                    summary.bytes_read += n;
                    self.decoder.push(&self.read_buf[..n]);
                    self.process_frames(now, &mut summary);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Transport read failed");
                    self.stats.read_errors += 1;
                    read_error = Some(e);
                    break;
                }
            }
        }

        self.check_link(now, &mut summary);

        match read_error {
            Some(e) => Err(e.into()),
            None => Ok(summary),
        }
    }

    /// Queued requests have no caller to report to: failures are logged and
    /// counted by the operations themselves, and the poll carries on.
    fn apply_requests(&mut self) {
        while let Some(request) = control::next_request(&self.rx) {
            tracing::debug!(?request, "Applying control request");
            let result = match request {
                ControlRequest::SetParameter(parameter, value) => {
                    self.set_parameter(parameter, value)
                }
                ControlRequest::Reset => self.reset().map(|_| ()),
                ControlRequest::SetFlashMode(enable) => self.set_flash_mode(enable),
            };
            if let Err(e) = result {
                tracing::debug!(?request, error = %e, "Queued request not applied");
            }
        }
    }

    fn process_frames(&mut self, now: Instant, summary: &mut PollSummary) {
        let ceiling = self.config.component.ceiling_height;
        while let Some(frame) = self.decoder.next_frame(ceiling) {
            self.last_frame_at = Some(now);
            self.stats.frames += 1;
            summary.frames += 1;

            let retained = boundary::retain(&frame.detections, &self.config.component);
            let outcome = self
                .tracker
                .update(&retained, self.config.component.max_tracks);
            tracing::debug!(
                frame = frame.header.frame_number,
                detections = frame.detections.len(),
                retained = retained.len(),
                bound = outcome.bound.len(),
                released = outcome.released.len(),
                dropped = outcome.dropped_no_slot,
                "Frame cycle"
            );
            summary.published += self.publish();
        }
    }

    fn check_link(&mut self, now: Instant, summary: &mut PollSummary) {
        let Some(last) = self.last_frame_at else {
            return;
        };
        let silent = now.saturating_duration_since(last);
        if !self.tracker.any_occupied() || silent < self.config.link_timeout() {
            return;
        }
        let released = self.tracker.release_all();
        tracing::warn!(
            released = released.len(),
            silent_ms = silent.as_millis() as u64,
            "No frames from sensor; releasing all slots"
        );
        self.stats.link_losses += 1;
        summary.link_lost = true;
        summary.published += self.publish();
    }

    fn publish(&mut self) -> usize {
        let snapshots = self.tracker.snapshots();
        self.publisher.publish(&snapshots)
    }

    pub fn slots(&self) -> &[PersonSlot] {
        self.tracker.slots()
    }

    pub fn snapshots(&self) -> Vec<SlotSnapshot> {
        self.tracker.snapshots()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn decode_stats(&self) -> &DecodeStats {
        self.decoder.stats()
    }

    /// Channel invocations since creation.
    pub fn published_total(&self) -> u64 {
        self.publisher.published_total()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::OutputValue;
    use crate::tracking::SlotState;
    use iwr6843_hardware::adapter::{MemoryCommandPort, MemoryLine, MemoryTransport};
    use iwr6843_hardware::{FrameBuilder, Iwr6843Control, TargetRecord, Vec3};
    use std::time::Duration;

    fn frame(n: u32, targets: &[(u32, f32, f32, f32)]) -> Vec<u8> {
        let records: Vec<TargetRecord> = targets
            .iter()
            .map(|&(id, x, y, z)| TargetRecord {
                track_id: id,
                position: Vec3::new(x, y, z - 2.9),
                confidence: 1.0,
                ..TargetRecord::default()
            })
            .collect();
        FrameBuilder::new(n).targets(&records).build()
    }

    fn engine() -> Engine<MemoryTransport, fn(OutputValue)> {
        Engine::new(DriverConfig::default(), MemoryTransport::new()).unwrap()
    }

    #[test]
    fn test_queued_parameter_applied_on_next_poll() {
        let mut engine = engine();
        let handle = engine.control_handle();
        handle.set_parameter(Parameter::CeilingHeight, 250.0).unwrap();
        assert_eq!(engine.parameter(Parameter::CeilingHeight), 290.0);

        engine.poll(Instant::now()).unwrap();
        assert_eq!(engine.parameter(Parameter::CeilingHeight), 250.0);
    }

    #[test]
    fn test_queued_invalid_parameter_is_dropped() {
        let mut engine = engine();
        engine
            .control_handle()
            .set_parameter(Parameter::MaxTracks, 7.0)
            .unwrap();

        engine.poll(Instant::now()).unwrap();
        assert_eq!(engine.parameter(Parameter::MaxTracks), 5.0);
        assert_eq!(engine.stats().rejected_updates, 1);
    }

    #[test]
    fn test_read_error_reported_after_processing() {
        let mut engine = engine();
        engine.transport_mut().push_chunk(frame(1, &[(1, 0.0, 0.0, 1.0)]));
        engine.transport_mut().push_error("uart framing");
        engine.transport_mut().push_chunk(frame(2, &[(1, 0.0, 0.0, 1.0)]));

        let err = engine.poll(Instant::now()).unwrap_err();
        assert!(matches!(err, DriverError::Transport(_)));
        assert_eq!(engine.stats().frames, 1);

        let summary = engine.poll(Instant::now()).unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(engine.stats().read_errors, 1);
    }

    #[test]
    fn test_reset_discards_partial_frame_but_keeps_slots() {
        let mut engine = engine();
        engine.transport_mut().push_chunk(frame(1, &[(4, 0.0, 0.0, 1.0)]));
        engine.poll(Instant::now()).unwrap();

        let partial = frame(2, &[(4, 1.0, 0.0, 1.0)]);
        engine.transport_mut().push_chunk(partial[..50].to_vec());
        engine.poll(Instant::now()).unwrap();

        assert_eq!(engine.reset().unwrap(), None);
        engine.transport_mut().push_chunk(partial[50..].to_vec());
        let summary = engine.poll(Instant::now()).unwrap();

        assert_eq!(summary.frames, 0);
        assert_eq!(engine.slots()[0].state(), SlotState::Bound { track_id: 4 });
    }

    #[test]
    fn test_link_watchdog_releases_once() {
        let mut engine = engine();
        let start = Instant::now();
        engine.transport_mut().push_chunk(frame(1, &[(4, 0.0, 0.0, 1.0)]));
        engine.poll(start).unwrap();

        let early = engine.poll(start + Duration::from_millis(1500)).unwrap();
        assert!(!early.link_lost);

        let late = engine.poll(start + Duration::from_millis(2000)).unwrap();
        assert!(late.link_lost);
        assert_eq!(engine.slots()[0].state(), SlotState::Unbound);

        let later = engine.poll(start + Duration::from_millis(5000)).unwrap();
        assert!(!later.link_lost);
        assert_eq!(engine.stats().link_losses, 1);
    }

    #[test]
    fn test_register_output_requires_declared_slot() {
        let mut config = DriverConfig::default();
        config.component.slots.truncate(2);
        let mut engine: Engine<MemoryTransport, fn(OutputValue)> =
            Engine::new(config, MemoryTransport::new()).unwrap();

        fn sink(_: OutputValue) {}
        let three = SlotId::new(3).unwrap();
        assert!(engine.register_output(three, OutputKind::X, sink).is_err());
        assert!(engine
            .register_output(SlotId::new(2).unwrap(), OutputKind::X, sink)
            .is_ok());
    }

    #[test]
    fn test_sensor_control_driven_by_requests() {
        let nrst = MemoryLine::new("nrst");
        let sop2 = MemoryLine::new("sop2");
        let control = Iwr6843Control::new(nrst.clone(), sop2.clone())
            .with_command_port(MemoryCommandPort::new())
            .with_timing(instant_timing());
        let mut engine = engine().with_sensor_control(Box::new(control));
        engine.setup().unwrap();
        assert_eq!(nrst.history(), vec![true, false, true]);
        assert_eq!(sop2.level(), Some(true));

        let handle = engine.control_handle();
        handle.set_flash_mode(true).unwrap();
        engine.poll(Instant::now()).unwrap();
        assert!(engine.flash_mode());
        assert_eq!(sop2.level(), Some(false));

        handle.reset().unwrap();
        engine.poll(Instant::now()).unwrap();
        assert!(!engine.flash_mode());
        assert_eq!(nrst.history(), vec![true, false, true, false, true]);
    }

    fn instant_timing() -> iwr6843_hardware::ResetTiming {
        iwr6843_hardware::ResetTiming {
            pulse: Duration::ZERO,
            boot_delay: Duration::ZERO,
            boot_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_setup_drives_control_lines_before_profile() {
        let nrst = MemoryLine::new("nrst");
        let sop2 = MemoryLine::new("sop2");
        let control = Iwr6843Control::new(nrst.clone(), sop2.clone()).with_timing(instant_timing());
        let mut engine = engine().with_sensor_control(Box::new(control));

        assert!(nrst.history().is_empty());
        engine.setup().unwrap();
        assert_eq!(nrst.level(), Some(true));
        assert_eq!(sop2.history(), vec![true, true]);
        assert!(!engine.flash_mode());
    }

    #[test]
    fn test_failed_allocation_push_keeps_max_tracks() {
        let mut port = MemoryCommandPort::new();
        port.fail_sends(true);
        let control = Iwr6843Control::new(MemoryLine::new("nrst"), MemoryLine::new("sop2"))
            .with_command_port(port)
            .with_timing(instant_timing());
        let mut engine = engine().with_sensor_control(Box::new(control));

        let err = engine.set_parameter(Parameter::MaxTracks, 2.0).unwrap_err();
        assert!(matches!(err, DriverError::Control(_)));
        assert_eq!(engine.parameter(Parameter::MaxTracks), 5.0);
        assert_eq!(engine.stats().control_failures, 1);
        assert_eq!(engine.stats().rejected_updates, 0);
    }

    #[test]
    fn test_failed_queued_request_does_not_stall_poll() {
        let mut port = MemoryCommandPort::new();
        port.fail_sends(true);
        let control = Iwr6843Control::new(MemoryLine::new("nrst"), MemoryLine::new("sop2"))
            .with_command_port(port)
            .with_timing(instant_timing());
        let mut engine = engine().with_sensor_control(Box::new(control));

        engine
            .control_handle()
            .set_parameter(Parameter::MaxTracks, 2.0)
            .unwrap();
        engine.transport_mut().push_chunk(frame(1, &[(6, 0.0, 0.0, 1.0)]));
        let summary = engine.poll(Instant::now()).unwrap();

        assert_eq!(summary.frames, 1);
        assert_eq!(engine.parameter(Parameter::MaxTracks), 5.0);
        assert_eq!(engine.stats().control_failures, 1);
        assert_eq!(engine.slots()[0].state(), SlotState::Bound { track_id: 6 });
    }

    #[test]
    fn test_control_queue_is_bounded() {
        let mut config = DriverConfig::default();
        config.control_queue_capacity = 2;
        let mut engine: Engine<MemoryTransport, fn(OutputValue)> =
            Engine::new(config, MemoryTransport::new()).unwrap();
        let handle = engine.control_handle();

        handle.set_flash_mode(true).unwrap();
        handle.set_flash_mode(false).unwrap();
        assert!(matches!(
            handle.set_flash_mode(true),
            Err(DriverError::ControlQueueFull { capacity: 2 })
        ));

        engine.poll(Instant::now()).unwrap();
        handle.set_flash_mode(true).unwrap();
    }

    #[test]
    fn test_lowering_max_tracks_releases_highest_slots() {
        let mut engine = engine();
        engine.transport_mut().push_chunk(frame(
            1,
            &[(1, 0.0, 0.0, 1.0), (2, 1.0, 0.0, 1.0), (3, 2.0, 0.0, 1.0)],
        ));
        engine.poll(Instant::now()).unwrap();

        engine.set_parameter(Parameter::MaxTracks, 1.0).unwrap();
        let states: Vec<SlotState> = engine.slots().iter().map(|s| s.state()).collect();
        assert_eq!(states[0], SlotState::Bound { track_id: 1 });
        assert_eq!(states[1], SlotState::Unbound);
        assert_eq!(states[2], SlotState::Unbound);
    }
}
