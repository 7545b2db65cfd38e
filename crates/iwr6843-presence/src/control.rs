//! Queued control requests.
//!
//! A [`ControlHandle`] can be cloned and moved to other threads (an automation
//! front end, a button handler). Requests are queued and applied by the
//! engine at the start of its next poll, never in the middle of a frame cycle.

use std::sync::mpsc::{Receiver, SyncSender, TryRecvError, TrySendError};

use crate::error::DriverError;
use crate::parameter::Parameter;

/// A request applied between frame cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlRequest {
    SetParameter(Parameter, f32),
    Reset,
    SetFlashMode(bool),
}

/// Sending side of the engine's control queue.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: SyncSender<ControlRequest>,
    capacity: usize,
}

impl ControlHandle {
    pub(crate) fn new(tx: SyncSender<ControlRequest>, capacity: usize) -> Self {
        Self { tx, capacity }
    }

    /// Queue a parameter update. Validation happens when it is applied; a
    /// rejected value is logged and the previous value kept.
    pub fn set_parameter(&self, parameter: Parameter, value: f32) -> Result<(), DriverError> {
        self.send(ControlRequest::SetParameter(parameter, value))
    }

    /// Queue a sensor reset.
    pub fn reset(&self) -> Result<(), DriverError> {
        self.send(ControlRequest::Reset)
    }

    pub fn set_flash_mode(&self, enable: bool) -> Result<(), DriverError> {
        self.send(ControlRequest::SetFlashMode(enable))
    }

    /// Queue a request without blocking.
    ///
    /// Fails with [`DriverError::ControlQueueFull`] when the engine has not
    /// polled since the queue filled up.
    pub fn send(&self, request: ControlRequest) -> Result<(), DriverError> {
        self.tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => DriverError::ControlQueueFull {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => DriverError::ControlClosed,
        })
    }
}

/// Take the next queued request without blocking.
pub(crate) fn next_request(rx: &Receiver<ControlRequest>) -> Option<ControlRequest> {
    match rx.try_recv() {
        Ok(request) => Some(request),
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
    }
}
