//! Scripted DSP instances
//!
//! A script supplies the processing behaviour of a [`ScriptNode`](crate::node::ScriptNode).
//! The node talks to it only through the [`ScriptLoader`] and
//! [`ScriptInstance`] traits; the shipped backend is Rhai.
//!
//! ## Script Contract
//!
//! The top-level code of a script must evaluate to an object map:
//!
//! - `process: Fn(..)` - required, a script function or closure `(audio, midi)`
//! - `prepare: Fn(..)` - optional, `(sample_rate, block_size)`
//! - `release: Fn(..)` - optional, no arguments
//! - `save: Fn(..)` - optional, returns a blob or string
//! - `restore: Fn(..)` - optional, receives a blob
//! - `ports: [..]` - optional port declarations
//! - `name: ".."` - optional display name
//!
//! Each port declaration is a map
//! `#{ kind: "audio" | "midi" | "control", input: bool, channel: int }`;
//! control ports may add `name`, `min`, `max` and `initial`.
//!
//! Callbacks run with `this` bound to the returned map, which holds the
//! instance's private state. `this.controls[ch]` and
//! `this.control_outputs[ch]` give the parameters of declared control ports.
//!
//! ## Example Script
//!
//! ```rhai
//! fn process(audio, midi) {
//!     audio.apply_gain(this.controls[0].value);
//! }
//!
//! #{
//!     name: "Gain",
//!     process: Fn("process"),
//!     ports: [
//!         #{ kind: "audio", input: true, channel: 0 },
//!         #{ kind: "audio", input: false, channel: 0 },
//!         #{ kind: "control", input: true, channel: 0, name: "Gain", min: 0.0, max: 2.0, initial: 1.0 }
//!     ]
//! }
//! ```

mod api;
pub mod builtins;
mod engine;
mod instance;
mod loader;

pub use api::{AudioHandle, MidiBufferHandle, PipeHandle};
pub use engine::ScriptRuntime;
pub use instance::RhaiScript;
pub use loader::RhaiLoader;

use crate::audio::AudioBuffer;
use crate::error::Result;
use crate::node::Port;
use crate::parameter::SharedParameter;
use crate::pipe::BufferPipe;

/// Validates and compiles script source into instances.
///
/// Implementations must not touch any currently active instance.
#[cfg_attr(test, mockall::automock)]
pub trait ScriptLoader: Send + Sync {
    /// Static contract check. Cheap and side-effect free.
    fn validate(&self, code: &str) -> Result<()>;

    /// Run the script once and wrap the object it returns.
    fn compile(&self, code: &str) -> Result<Box<dyn ScriptInstance>>;
}

/// A compiled script honouring the DSP capability contract.
pub trait ScriptInstance: Send {
    /// Source the instance was compiled from.
    fn source(&self) -> &str;

    /// Display name.
    fn name(&self) -> &str {
        "Script"
    }

    /// Declared ports. Fixed for the lifetime of the instance.
    fn ports(&self) -> &[Port];

    /// Parameter for a control channel, created on first use.
    ///
    /// Repeated calls with the same key return the same `Arc`.
    fn parameter(&self, channel: u32, input: bool) -> SharedParameter;

    /// Parameter for a control channel if one exists, without creating it.
    fn find_parameter(&self, channel: u32, input: bool) -> Option<SharedParameter>;

    /// Visit every existing parameter.
    fn for_each_parameter(&self, f: &mut dyn FnMut(&SharedParameter));

    /// Set up for rendering. Calling it again while prepared does nothing.
    fn prepare(&mut self, sample_rate: f64, block_size: usize) -> Result<()>;

    /// Render one block.
    fn process(&mut self, audio: &mut AudioBuffer, midi: &mut BufferPipe<'_>) -> Result<()>;

    /// Mirror of `prepare`. Calling it while not prepared does nothing.
    fn release(&mut self);

    /// Final teardown hook after `release`, before the instance is dropped.
    fn cleanup(&mut self) {}

    /// Serialise private state into an opaque blob.
    fn save(&mut self) -> Result<Vec<u8>>;

    /// Restore private state from a blob produced by `save`.
    fn restore(&mut self, data: &[u8]) -> Result<()>;

    fn is_prepared(&self) -> bool;

    /// Copy values from `previous` into matching parameters of this instance.
    ///
    /// Parameters are matched by channel and direction; keys that exist on
    /// only one side are ignored.
    fn copy_parameter_values(&self, previous: &dyn ScriptInstance) {
        previous.for_each_parameter(&mut |old: &SharedParameter| {
            if let Some(new) = self.find_parameter(old.channel(), old.is_input()) {
                new.set_value(old.value());
            }
        });
    }
}
