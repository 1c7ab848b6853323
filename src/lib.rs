//! # scriptnode-rs: Scriptable Real-Time Audio/MIDI Node
//!
//! A processing node whose DSP behaviour is supplied by a user script that
//! can be recompiled and hot-swapped while audio keeps running.
//!
//! ## Architecture
//!
//! - **Pipe**: fixed-capacity MIDI buffer pipes for one render cycle, plus a
//!   script-owned variant backed by a reference-counted buffer table
//! - **Scripting**: the `ScriptLoader`/`ScriptInstance` contract and its Rhai backend
//! - **Node**: `ScriptNode`, the hot-swap state machine exposed to a hosting graph
//! - **Persistence**: script source, editor text and the script's opaque state,
//!   stored as compressed JSON
//!
//! ## Threading
//!
//! One real-time thread calls `render`. Reloads and state restores run on
//! other threads; compilation never happens under the render-exclusion lock.
//!
//! ## Example
//!
//! ```no_run
//! use scriptnode_rs::{
//!     audio::AudioBuffer,
//!     config::NodeConfig,
//!     midi::MidiBuffer,
//!     node::{Processor, ScriptNode},
//!     pipe::BufferPipe,
//!     scripting::builtins,
//! };
//!
//! let config = NodeConfig::load_or_default();
//! let node = ScriptNode::with_rhai(&config);
//! node.load_script(builtins::GAIN).unwrap();
//! node.prepare_to_render(44_100.0, 512);
//!
//! let mut audio = AudioBuffer::new(2, 512);
//! let mut midi = vec![MidiBuffer::new()];
//! let mut pipe = BufferPipe::from_slice(&mut midi, 1);
//! node.render(&mut audio, &mut pipe);
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod node;
pub mod parameter;
pub mod pipe;
pub mod scripting;

// Re-export commonly used types
pub use audio::AudioBuffer;
pub use config::NodeConfig;
pub use error::{Result, ScriptError};
pub use midi::{MidiBuffer, MidiEvent, MidiMessage};
pub use node::{NodeEvent, NodeState, Persistable, PortHost, Processor, ScriptNode};
pub use parameter::{Parameter, ParameterRange};
pub use pipe::{BufferPipe, ManagedBufferPipe};
pub use scripting::{RhaiLoader, ScriptInstance, ScriptLoader};
