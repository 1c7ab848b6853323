//! Automatable control values shared between host, node and script.
//!
//! A `Parameter` is an `Arc`-shared cell holding one control port's value.
//! Reads and writes are lock-free so the render thread can consume them
//! while the host automates from elsewhere.
//!
//! # Example
//!
//! ```
//! use scriptnode_rs::parameter::{Parameter, ParameterRange};
//!
//! let gain = Parameter::new(0, true, "Gain", ParameterRange::new(0.0, 2.0, 1.0));
//! gain.set_value(5.0);
//! assert_eq!(gain.value(), 2.0); // clamped
//! gain.set_normalized(0.25);
//! assert_eq!(gain.value(), 0.5);
//! ```

use atomic_float::AtomicF32;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Identifies a parameter by its control port channel and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey {
    pub channel: u32,
    pub input: bool,
}

impl ParamKey {
    #[inline]
    pub const fn new(channel: u32, input: bool) -> Self {
        Self { channel, input }
    }

    #[inline]
    pub const fn input(channel: u32) -> Self {
        Self::new(channel, true)
    }

    #[inline]
    pub const fn output(channel: u32) -> Self {
        Self::new(channel, false)
    }
}

/// Valid range of a parameter with its default value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParameterRange {
    /// Create a range. Bounds are swapped if given in the wrong order and
    /// the default is clamped into the range.
    pub fn new(min: f32, max: f32, default: f32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            default: default.clamp(min, max),
        }
    }

    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default;
        }
        value.clamp(self.min, self.max)
    }

    /// Real value to 0.0-1.0.
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        let range = self.max - self.min;
        if range <= 0.0 {
            return 0.0;
        }
        (self.clamp(value) - self.min) / range
    }

    /// 0.0-1.0 to real value.
    #[inline]
    pub fn denormalize(&self, normalized: f32) -> f32 {
        let normalized = if normalized.is_nan() {
            0.0
        } else {
            normalized.clamp(0.0, 1.0)
        };
        self.min + normalized * (self.max - self.min)
    }
}

impl Default for ParameterRange {
    fn default() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }
}

/// One automatable control value.
pub struct Parameter {
    key: ParamKey,
    name: String,
    range: ParameterRange,
    value: AtomicF32,
}

/// Shared handle to a parameter
pub type SharedParameter = Arc<Parameter>;

impl Parameter {
    pub fn new(channel: u32, input: bool, name: impl Into<String>, range: ParameterRange) -> Self {
        Self {
            key: ParamKey::new(channel, input),
            name: name.into(),
            range,
            value: AtomicF32::new(range.default),
        }
    }

    /// Create a shared parameter.
    pub fn shared(
        channel: u32,
        input: bool,
        name: impl Into<String>,
        range: ParameterRange,
    ) -> SharedParameter {
        Arc::new(Self::new(channel, input, name, range))
    }

    #[inline]
    pub fn key(&self) -> ParamKey {
        self.key
    }

    #[inline]
    pub fn channel(&self) -> u32 {
        self.key.channel
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.key.input
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn range(&self) -> ParameterRange {
        self.range
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Store a new value, clamped to the range.
    #[inline]
    pub fn set_value(&self, value: f32) {
        self.value.store(self.range.clamp(value), Ordering::Relaxed);
    }

    #[inline]
    pub fn normalized(&self) -> f32 {
        self.range.normalize(self.value())
    }

    #[inline]
    pub fn set_normalized(&self, normalized: f32) {
        self.set_value(self.range.denormalize(normalized));
    }

    /// Return to the default value.
    pub fn reset(&self) {
        self.set_value(self.range.default);
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("channel", &self.key.channel)
            .field("input", &self.key.input)
            .field("name", &self.name)
            .field("value", &self.value())
            .field("range", &self.range)
            .finish()
    }
}
