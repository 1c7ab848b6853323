//! Port descriptors for script nodes.
//!
//! A script declares its ports when it is compiled. The node publishes them
//! to the host, which uses them to wire pipes and to look up parameters.
//! A published port list never changes for a given script instance.

use crate::parameter::{ParamKey, ParameterRange};

/// Highest channel index a script may declare for any port.
pub const MAX_PORT_CHANNEL: u32 = 1023;

/// The kind of data flowing through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    /// Audio channel.
    Audio,
    /// MIDI event stream.
    Midi,
    /// Automatable control value.
    Control,
}

impl PortType {
    /// Parse the name scripts use in port declarations.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "audio" => Some(PortType::Audio),
            "midi" => Some(PortType::Midi),
            "control" => Some(PortType::Control),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PortType::Audio => "audio",
            PortType::Midi => "midi",
            PortType::Control => "control",
        }
    }
}

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    #[inline]
    pub fn is_input(self) -> bool {
        self == PortDirection::Input
    }

    #[inline]
    pub fn from_input(input: bool) -> Self {
        if input {
            PortDirection::Input
        } else {
            PortDirection::Output
        }
    }
}

/// Descriptor for one port of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub kind: PortType,
    pub direction: PortDirection,
    pub channel: u32,
    pub name: String,
    /// Value range, only meaningful for control ports.
    pub range: Option<ParameterRange>,
}

impl Port {
    pub fn new(kind: PortType, direction: PortDirection, channel: u32) -> Self {
        Self {
            kind,
            direction,
            channel,
            name: default_name(kind, direction, channel),
            range: None,
        }
    }

    pub fn input(kind: PortType, channel: u32) -> Self {
        Self::new(kind, PortDirection::Input, channel)
    }

    pub fn output(kind: PortType, channel: u32) -> Self {
        Self::new(kind, PortDirection::Output, channel)
    }

    /// A control port with a value range.
    pub fn control(direction: PortDirection, channel: u32, range: ParameterRange) -> Self {
        Self {
            range: Some(range),
            ..Self::new(PortType::Control, direction, channel)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.direction.is_input()
    }

    /// Parameter key for a control port.
    pub fn param_key(&self) -> Option<ParamKey> {
        (self.kind == PortType::Control).then(|| ParamKey::new(self.channel, self.is_input()))
    }
}

fn default_name(kind: PortType, direction: PortDirection, channel: u32) -> String {
    let dir = match direction {
        PortDirection::Input => "in",
        PortDirection::Output => "out",
    };
    format!("{} {} {}", kind.name(), dir, channel + 1)
}

/// Counting helpers over a port slice.
pub trait PortList {
    /// Number of ports of `kind` in `direction`.
    fn count(&self, kind: PortType, direction: PortDirection) -> usize;

    /// Find a port by type, direction and channel.
    fn find(&self, kind: PortType, direction: PortDirection, channel: u32) -> Option<&Port>;

    /// Channels of MIDI inputs in declaration order.
    fn midi_input_channels(&self) -> Vec<usize>;
}

impl PortList for [Port] {
    fn count(&self, kind: PortType, direction: PortDirection) -> usize {
        self.iter()
            .filter(|p| p.kind == kind && p.direction == direction)
            .count()
    }

    fn find(&self, kind: PortType, direction: PortDirection, channel: u32) -> Option<&Port> {
        self.iter()
            .find(|p| p.kind == kind && p.direction == direction && p.channel == channel)
    }

    fn midi_input_channels(&self) -> Vec<usize> {
        self.iter()
            .filter(|p| p.kind == PortType::Midi && p.is_input())
            .map(|p| p.channel as usize)
            .collect()
    }
}
