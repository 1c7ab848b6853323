//! Capability interfaces a hosting graph uses to drive a node.
//!
//! Each concern is its own small trait so a node only implements what it
//! supports and hosts depend only on what they call.

use crate::audio::AudioBuffer;
use crate::error::Result;
use crate::node::Port;
use crate::parameter::SharedParameter;
use crate::pipe::BufferPipe;

/// Real-time processing.
pub trait Processor {
    /// Enter the prepared state. Does nothing if already prepared.
    fn prepare_to_render(&self, sample_rate: f64, block_size: usize);

    /// Leave the prepared state. Does nothing if not prepared.
    fn release_resources(&self);

    /// Process one block. Called from the render thread only.
    fn render(&self, audio: &mut AudioBuffer, midi: &mut BufferPipe<'_>);
}

/// Port and parameter description.
pub trait PortHost {
    /// Re-read the active script's ports and publish them.
    fn refresh_ports(&self);

    /// Currently published ports.
    fn ports(&self) -> Vec<Port>;

    /// Parameter behind a control port. `None` for other port kinds or
    /// when no script is loaded.
    fn parameter(&self, port: &Port) -> Option<SharedParameter>;

    fn description(&self) -> PluginDescription;
}

/// Opaque state round trip.
pub trait Persistable {
    fn get_state(&self) -> Result<Vec<u8>>;

    /// Load the stored script, then hand it the stored blob.
    ///
    /// Fails when the container is corrupt or the script is rejected, in
    /// which case nothing changes. Once the script is loaded the call
    /// succeeds; a blob the script cannot restore is logged and dropped.
    fn set_state(&self, data: &[u8]) -> Result<()>;
}

/// Static descriptor shown by plugin browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescription {
    pub name: String,
    pub descriptive_name: String,
    pub identifier: String,
    pub format: String,
    pub version: String,
    pub num_inputs: u32,
    pub num_outputs: u32,
    pub is_instrument: bool,
}

impl PluginDescription {
    /// Descriptor of the built-in script node.
    pub fn script_node() -> Self {
        Self {
            name: "Script".to_string(),
            descriptive_name: "A user scriptable node".to_string(),
            identifier: "scriptnode.script".to_string(),
            format: "Internal".to_string(),
            version: "1.0.0".to_string(),
            num_inputs: 0,
            num_outputs: 0,
            is_instrument: false,
        }
    }
}
