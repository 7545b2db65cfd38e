//! SPI data transport with a manually driven chip-select line.

use crate::error::TransportError;
use crate::port::{OutputLine, SpiBus, TransportPort};

/// Reads the sensor's data stream over SPI.
///
/// Chip select is active low: it is pulled low for the transfer and released
/// afterwards, also when the transfer fails.
pub struct SpiTransport<B, L> {
    bus: B,
    cs: L,
}

impl<B: SpiBus, L: OutputLine> SpiTransport<B, L> {
    /// Create the transport and park chip select high.
    pub fn new(bus: B, mut cs: L) -> Result<Self, TransportError> {
        cs.set_level(true)?;
        Ok(Self { bus, cs })
    }

    pub fn into_parts(self) -> (B, L) {
        (self.bus, self.cs)
    }
}

impl<B: SpiBus, L: OutputLine> TransportPort for SpiTransport<B, L> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.cs.set_level(false)?;
        let result = self.bus.transfer_in(buf);
        let released = self.cs.set_level(true);
        let n = result?;
        released?;
        Ok(n)
    }
}
