//! Transport over any [`std::io::Read`] source (capture files, pipes, serial devices).

use std::io::{ErrorKind, Read};

use crate::error::TransportError;
use crate::port::TransportPort;

/// Wraps a reader as a [`TransportPort`].
///
/// `WouldBlock`, `TimedOut` and `Interrupted` are reported as "nothing
/// available". End of input is also `Ok(0)`; [`ReaderTransport::is_eof`]
/// tells the two apart.
#[derive(Debug)]
pub struct ReaderTransport<R> {
    inner: R,
    eof: bool,
}

impl<R: Read> ReaderTransport<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, eof: false }
    }

    /// True once the reader has returned end of input.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> TransportPort for ReaderTransport<R> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.eof || buf.is_empty() {
            return Ok(0);
        }
        match self.inner.read(buf) {
            Ok(0) => {
                self.eof = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }
}
