//! Publisher: forwards changed slot values to registered output channels.
//!
//! Channels live in a fixed table indexed by slot and [`OutputKind`]. The
//! publisher remembers the last value it published for each entry and only
//! invokes a channel when the value changes. The table starts out holding
//! the values of an unbound slot, so nothing is published until a slot is
//! actually bound unless [`Publisher::publish_initial_state`] is called.

use std::fmt;

use crate::config::OutputUnit;
use crate::tracking::{SlotId, SlotSnapshot, MAX_SLOTS};

const KINDS: usize = 6;

/// One observable output of a person slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    X,
    Y,
    Z,
    /// Vertical velocity.
    Velocity,
    Presence,
    Fall,
}

impl OutputKind {
    pub const ALL: [OutputKind; KINDS] = [
        OutputKind::X,
        OutputKind::Y,
        OutputKind::Z,
        OutputKind::Velocity,
        OutputKind::Presence,
        OutputKind::Fall,
    ];

    fn index(&self) -> usize {
        match self {
            OutputKind::X => 0,
            OutputKind::Y => 1,
            OutputKind::Z => 2,
            OutputKind::Velocity => 3,
            OutputKind::Presence => 4,
            OutputKind::Fall => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputKind::X => "x",
            OutputKind::Y => "y",
            OutputKind::Z => "z",
            OutputKind::Velocity => "velocity",
            OutputKind::Presence => "presence",
            OutputKind::Fall => "fall",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value delivered to an output channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputValue {
    /// Coordinate or velocity, rounded to two decimals. `None` when unbound.
    Number(Option<f32>),
    Binary(bool),
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputValue::Number(Some(v)) => write!(f, "{v:.2}"),
            OutputValue::Number(None) => f.write_str("unknown"),
            OutputValue::Binary(b) => write!(f, "{}", if *b { "on" } else { "off" }),
        }
    }
}

/// Receiver of published values.
pub trait OutputChannel {
    fn publish(&mut self, value: OutputValue);
}

impl<F: FnMut(OutputValue)> OutputChannel for F {
    fn publish(&mut self, value: OutputValue) {
        self(value)
    }
}

const UNBOUND_VALUES: [OutputValue; KINDS] = [
    OutputValue::Number(None),
    OutputValue::Number(None),
    OutputValue::Number(None),
    OutputValue::Number(None),
    OutputValue::Binary(false),
    OutputValue::Binary(false),
];

pub struct Publisher<C> {
    channels: [[Option<C>; KINDS]; MAX_SLOTS],
    last: [[OutputValue; KINDS]; MAX_SLOTS],
    unit: OutputUnit,
    published: u64,
}

impl<C: OutputChannel> Publisher<C> {
    pub fn new(unit: OutputUnit) -> Self {
        Self {
            channels: std::array::from_fn(|_| std::array::from_fn(|_| None)),
            last: [UNBOUND_VALUES; MAX_SLOTS],
            unit,
            published: 0,
        }
    }

    pub fn unit(&self) -> OutputUnit {
        self.unit
    }

    /// Register `channel` for one slot output, returning any channel it replaces.
    pub fn register(&mut self, slot: SlotId, kind: OutputKind, channel: C) -> Option<C> {
        self.channels[slot.index()][kind.index()].replace(channel)
    }

    pub fn is_registered(&self, slot: SlotId, kind: OutputKind) -> bool {
        self.channels[slot.index()][kind.index()].is_some()
    }

    /// Total channel invocations so far.
    pub fn published_total(&self) -> u64 {
        self.published
    }

    /// Values a snapshot maps to, in [`OutputKind::ALL`] order.
    pub fn values(&self, snapshot: &SlotSnapshot) -> [OutputValue; KINDS] {
        let scale = self.unit.scale();
        let number = |v: Option<f32>| OutputValue::Number(v.map(|v| round2(v * scale)));
        [
            number(snapshot.position.map(|p| p.x)),
            number(snapshot.position.map(|p| p.y)),
            number(snapshot.position.map(|p| p.z)),
            number(snapshot.velocity.map(|v| v.z)),
            OutputValue::Binary(snapshot.present),
            OutputValue::Binary(snapshot.fallen),
        ]
    }

    /// Publish every value that differs from the last published one.
    ///
    /// Returns the number of channel invocations.
    pub fn publish(&mut self, snapshots: &[SlotSnapshot]) -> usize {
        self.publish_inner(snapshots, false)
    }

    /// Publish the current value of every registered channel, changed or not.
    pub fn publish_initial_state(&mut self, snapshots: &[SlotSnapshot]) -> usize {
        self.publish_inner(snapshots, true)
    }

    fn publish_inner(&mut self, snapshots: &[SlotSnapshot], force: bool) -> usize {
        let mut count = 0;
        for snapshot in snapshots {
            let row = snapshot.id.index();
            let values = self.values(snapshot);
            for kind in OutputKind::ALL {
                let col = kind.index();
                let value = values[col];
                if !force && self.last[row][col] == value {
                    continue;
                }
                self.last[row][col] = value;
                if let Some(channel) = self.channels[row][col].as_mut() {
                    tracing::trace!(slot = %snapshot.id, output = %kind, %value, "Publishing");
                    channel.publish(value);
                    count += 1;
                }
            }
        }
        self.published += count as u64;
        count
    }
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}
