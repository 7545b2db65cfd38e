//! Hardware ports.
//!
//! The sensor is reached through a handful of narrow traits so that the
//! decoding and tracking logic never depends on a concrete UART, SPI or GPIO
//! driver. Production builds implement these over the board HAL; tests use
//! the in-memory adapters in [`crate::adapter`].

use std::time::Duration;

use crate::error::{GpioError, TransportError};

/// Byte source carrying the sensor's data stream.
pub trait TransportPort {
    /// Copy whatever bytes are available into `buf` without blocking.
    ///
    /// Returns the number of bytes written; `Ok(0)` means nothing is pending.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

impl<T: TransportPort + ?Sized> TransportPort for Box<T> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read_available(buf)
    }
}

/// Line-oriented command interface (the sensor's CLI UART).
pub trait CommandPort {
    /// Send one command line. The implementation appends the line terminator.
    fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Return one complete response line if available, without blocking.
    fn read_line(&mut self) -> Result<Option<String>, TransportError>;
}

/// A single digital output line (NRST, SOP2, chip select).
pub trait OutputLine {
    /// Drive the line high (`true`) or low (`false`).
    fn set_level(&mut self, high: bool) -> Result<(), GpioError>;
}

/// Blocking delay provider.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// [`Delay`] backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Raw SPI bus capable of clocking bytes in.
pub trait SpiBus {
    /// Clock `buf.len()` bytes from the device into `buf`.
    ///
    /// Returns how many bytes carry data; the sensor pads idle transfers.
    fn transfer_in(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}
