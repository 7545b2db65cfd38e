//! In-memory port implementations for tests, simulators and replay.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{GpioError, TransportError};
use crate::port::{CommandPort, OutputLine, TransportPort};

#[derive(Debug)]
enum Pending {
    Bytes(Vec<u8>),
    Error(String),
}

/// Transport fed from a queue of byte chunks.
///
/// Each queued chunk is delivered by a separate `read_available` call (split
/// across calls if the caller's buffer is smaller), so tests control exactly
/// how the stream is fragmented. Errors can be queued between chunks.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    queue: VecDeque<Pending>,
    delivered: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a chunk of bytes.
    pub fn push_chunk(&mut self, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        if !bytes.is_empty() {
            self.queue.push_back(Pending::Bytes(bytes));
        }
    }

    /// Queue `bytes` split into chunks of at most `chunk_size` bytes.
    pub fn push_split(&mut self, bytes: &[u8], chunk_size: usize) {
        for chunk in bytes.chunks(chunk_size.max(1)) {
            self.push_chunk(chunk.to_vec());
        }
    }

    /// Queue a read failure, returned once in stream order.
    pub fn push_error(&mut self, reason: impl Into<String>) {
        self.queue.push_back(Pending::Error(reason.into()));
    }

    /// Total bytes handed out so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// True when nothing is left to deliver.
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty()
    }
}

impl TransportPort for MemoryTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let Some(front) = self.queue.pop_front() else {
            return Ok(0);
        };
        match front {
            Pending::Error(reason) => Err(TransportError::Bus(reason)),
            Pending::Bytes(mut bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    self.queue.push_front(Pending::Bytes(rest));
                }
                self.delivered += n;
                Ok(n)
            }
        }
    }
}

/// Command port that records sent lines and replays scripted responses.
#[derive(Debug, Default)]
pub struct MemoryCommandPort {
    sent: Vec<String>,
    responses: VecDeque<String>,
    fail_sends: bool,
}

impl MemoryCommandPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line the port returns from `read_line`.
    pub fn push_response(&mut self, line: impl Into<String>) {
        self.responses.push_back(line.into());
    }

    /// Make every subsequent `send_line` fail.
    pub fn fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl CommandPort for MemoryCommandPort {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::Disconnected("command port closed".into()));
        }
        self.sent.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.responses.pop_front())
    }
}

/// Output line that records every level it is driven to.
///
/// Clones share the same history, so a test can keep one handle while the
/// controller owns another.
#[derive(Debug, Clone)]
pub struct MemoryLine {
    name: String,
    history: Rc<RefCell<Vec<bool>>>,
    fail: Rc<RefCell<bool>>,
}

impl MemoryLine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            history: Rc::new(RefCell::new(Vec::new())),
            fail: Rc::new(RefCell::new(false)),
        }
    }

    /// Every level driven so far, oldest first.
    pub fn history(&self) -> Vec<bool> {
        self.history.borrow().clone()
    }

    /// The last level driven, if any.
    pub fn level(&self) -> Option<bool> {
        self.history.borrow().last().copied()
    }

    /// Make subsequent `set_level` calls fail.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.borrow_mut() = fail;
    }
}

impl OutputLine for MemoryLine {
    fn set_level(&mut self, high: bool) -> Result<(), GpioError> {
        if *self.fail.borrow() {
            return Err(GpioError::new(&self.name, "line unavailable"));
        }
        self.history.borrow_mut().push(high);
        Ok(())
    }
}
