//! Reset, flash-mode and command sequencing for the sensor.
//!
//! The IWR6843 is held in reset through NRST (active low) and boots into
//! either functional or flash mode depending on SOP2 (high = functional).
//! When a CLI UART is wired up the controller also pushes the sensor profile
//! and waits for the boot prompt.

use std::time::Duration;

use crate::error::{ControlError, TransportError};
use crate::port::{CommandPort, Delay, OutputLine, StdDelay};
use crate::profile;

/// Reset pulse and boot-wait timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetTiming {
    /// How long NRST is held low.
    pub pulse: Duration,
    /// Settle time after NRST is released, before the prompt is polled.
    pub boot_delay: Duration,
    /// Upper bound on waiting for the boot prompt.
    pub boot_timeout: Duration,
    /// Interval between prompt polls.
    pub poll_interval: Duration,
}

impl Default for ResetTiming {
    fn default() -> Self {
        Self {
            pulse: Duration::from_millis(100),
            boot_delay: Duration::from_millis(500),
            boot_timeout: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// How a reset ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStatus {
    /// The CLI prompt was seen.
    Acknowledged,
    /// No prompt within the boot timeout.
    TimedOut,
    /// No command port, so boot cannot be observed.
    NoCommandPort,
}

/// Control surface the engine drives.
pub trait SensorControl {
    /// Bring the sensor up: drive the control lines to functional mode,
    /// reset it and push the profile for `max_tracks` tracks.
    fn start(&mut self, max_tracks: u8) -> Result<BootStatus, ControlError>;

    /// Pulse the reset line, wait for boot and re-push the profile.
    fn reset(&mut self) -> Result<BootStatus, ControlError>;

    /// Drive the mode-select line; `true` selects flash mode.
    fn set_flash_mode(&mut self, enable: bool) -> Result<(), ControlError>;

    fn flash_mode(&self) -> bool;

    /// Change the sensor's track allocation on the fly.
    fn apply_max_tracks(&mut self, max_tracks: u8) -> Result<(), ControlError>;
}

/// Placeholder command port for sensors wired without the CLI UART.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCommandPort;

impl CommandPort for NullCommandPort {
    fn send_line(&mut self, _line: &str) -> Result<(), TransportError> {
        Err(TransportError::Disconnected("no command port".into()))
    }

    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        Ok(None)
    }
}

/// GPIO and UART control for one IWR6843.
pub struct Iwr6843Control<L, P = NullCommandPort, D = StdDelay> {
    nrst: L,
    sop2: L,
    commands: Option<P>,
    delay: D,
    timing: ResetTiming,
    flash: bool,
    max_tracks: u8,
}

impl<L: OutputLine> Iwr6843Control<L> {
    /// Controller without a command port, sleeping on the current thread.
    pub fn new(nrst: L, sop2: L) -> Self {
        Self {
            nrst,
            sop2,
            commands: None,
            delay: StdDelay,
            timing: ResetTiming::default(),
            flash: false,
            max_tracks: 5,
        }
    }
}

impl<L: OutputLine, P: CommandPort, D: Delay> Iwr6843Control<L, P, D> {
    pub fn with_command_port<Q: CommandPort>(self, port: Q) -> Iwr6843Control<L, Q, D> {
        Iwr6843Control {
            nrst: self.nrst,
            sop2: self.sop2,
            commands: Some(port),
            delay: self.delay,
            timing: self.timing,
            flash: self.flash,
            max_tracks: self.max_tracks,
        }
    }

    pub fn with_delay<E: Delay>(self, delay: E) -> Iwr6843Control<L, P, E> {
        Iwr6843Control {
            nrst: self.nrst,
            sop2: self.sop2,
            commands: self.commands,
            delay,
            timing: self.timing,
            flash: self.flash,
            max_tracks: self.max_tracks,
        }
    }

    pub fn with_timing(mut self, timing: ResetTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Release reset and select functional mode.
    pub fn init_lines(&mut self) -> Result<(), ControlError> {
        self.sop2.set_level(true)?;
        self.nrst.set_level(true)?;
        self.flash = false;
        tracing::info!("Control lines initialized (functional mode)");
        Ok(())
    }

    pub fn command_port(&self) -> Option<&P> {
        self.commands.as_ref()
    }

    fn send_all<I, S>(&mut self, lines: I) -> Result<(), ControlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(port) = self.commands.as_mut() else {
            tracing::debug!("No command port; skipping sensor commands");
            return Ok(());
        };
        for line in lines {
            let line = line.as_ref();
            tracing::debug!(command = line, "Sending sensor command");
            port.send_line(line)?;
        }
        Ok(())
    }

    fn wait_for_prompt(&mut self) -> Result<BootStatus, ControlError> {
        let Some(port) = self.commands.as_mut() else {
            return Ok(BootStatus::NoCommandPort);
        };
        let mut waited = Duration::ZERO;
        loop {
            while let Some(line) = port.read_line()? {
                if line.contains(profile::BOOT_PROMPT) {
                    return Ok(BootStatus::Acknowledged);
                }
            }
            if waited >= self.timing.boot_timeout {
                return Ok(BootStatus::TimedOut);
            }
            self.delay.delay(self.timing.poll_interval);
            waited += self.timing.poll_interval;
        }
    }
}

impl<L: OutputLine, P: CommandPort, D: Delay> SensorControl for Iwr6843Control<L, P, D> {
    fn start(&mut self, max_tracks: u8) -> Result<BootStatus, ControlError> {
        self.init_lines()?;
        self.max_tracks = max_tracks;
        self.reset()
    }

    fn reset(&mut self) -> Result<BootStatus, ControlError> {
        tracing::info!("Resetting sensor");
        self.sop2.set_level(true)?;
        self.flash = false;
        self.nrst.set_level(false)?;
        self.delay.delay(self.timing.pulse);
        self.nrst.set_level(true)?;
        self.delay.delay(self.timing.boot_delay);

        let status = self.wait_for_prompt()?;
        match status {
            BootStatus::Acknowledged => tracing::info!("Sensor boot acknowledged"),
            BootStatus::TimedOut => tracing::warn!(
                timeout_ms = self.timing.boot_timeout.as_millis() as u64,
                "No boot prompt from sensor; continuing"
            ),
            BootStatus::NoCommandPort => {}
        }

        let max_tracks = self.max_tracks;
        self.send_all(profile::startup_commands(max_tracks))?;
        tracing::info!(max_tracks, "Sensor profile applied");
        Ok(status)
    }

    fn set_flash_mode(&mut self, enable: bool) -> Result<(), ControlError> {
        self.sop2.set_level(!enable)?;
        self.flash = enable;
        tracing::info!(enabled = enable, "Flash mode changed");
        Ok(())
    }

    fn flash_mode(&self) -> bool {
        self.flash
    }

    fn apply_max_tracks(&mut self, max_tracks: u8) -> Result<(), ControlError> {
        self.send_all(profile::max_tracks_update(max_tracks))?;
        self.max_tracks = max_tracks;
        tracing::info!(max_tracks, "Track allocation updated");
        Ok(())
    }
}
