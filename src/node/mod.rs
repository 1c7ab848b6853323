//! Node layer: what a hosting graph sees of a script.
//!
//! - [`ScriptNode`] - hot-swap orchestration, render dispatch, persistence
//! - [`Port`] - port descriptors published by the active script
//! - [`Processor`], [`PortHost`], [`Persistable`] - capability traits the host drives
//! - [`NodeEvent`] - notifications (port-list reset, reload outcome, teardown)
//! - [`PersistedState`] - the compressed state container

pub mod capability;
pub mod events;
pub mod port;
mod script_node;
pub mod state;

pub use capability::{Persistable, PluginDescription, PortHost, Processor};
pub use events::{EventBus, NodeEvent};
pub use port::{Port, PortDirection, PortList, PortType, MAX_PORT_CHANNEL};
pub use script_node::{NodeState, ScriptNode};
pub use state::PersistedState;
