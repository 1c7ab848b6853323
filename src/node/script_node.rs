//! The scriptable processing node.
//!
//! `ScriptNode` owns the active [`ScriptInstance`] and runs the hot-swap
//! state machine:
//!
//! ```text
//! Unloaded -> Validating -> Compiling -> Swapping -> Active
//! Active   -> Validating   (every reload)
//! any      -> Released     (teardown)
//! ```
//!
//! Validation, compilation and preparing the candidate all happen outside
//! the render-exclusion lock. The lock is only taken to copy parameter
//! values and swap the instance, and by `render` for the whole `process`
//! call. A failed reload leaves the previous script running.

use crate::audio::AudioBuffer;
use crate::config::NodeConfig;
use crate::error::{Result, ScriptError};
use crate::node::capability::{Persistable, PluginDescription, PortHost, Processor};
use crate::node::events::{EventBus, NodeEvent};
use crate::node::state::PersistedState;
use crate::node::{Port, PortType};
use crate::parameter::SharedParameter;
use crate::pipe::BufferPipe;
use crate::scripting::{RhaiLoader, ScriptInstance, ScriptLoader};
use atomic_float::AtomicF64;
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

/// Lifecycle state of a script node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    Unloaded = 0,
    Validating = 1,
    Compiling = 2,
    Swapping = 3,
    Active = 4,
    Released = 5,
}

impl NodeState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => NodeState::Unloaded,
            1 => NodeState::Validating,
            2 => NodeState::Compiling,
            3 => NodeState::Swapping,
            4 => NodeState::Active,
            _ => NodeState::Released,
        }
    }
}

/// A graph node whose processing is supplied by a script.
pub struct ScriptNode {
    loader: Arc<dyn ScriptLoader>,
    /// Render-exclusion lock around the active instance
    active: Mutex<Option<Box<dyn ScriptInstance>>>,
    /// Serialises reloads, state restores and prepare/release
    load_lock: Mutex<()>,
    state: AtomicU8,
    prepared: AtomicBool,
    sample_rate: AtomicF64,
    block_size: AtomicUsize,
    dsp_code: Mutex<String>,
    editor_code: Mutex<String>,
    ports: Mutex<Vec<Port>>,
    events: EventBus,
    render_faults: AtomicU64,
}

impl ScriptNode {
    /// Create an empty node using `loader` for every reload.
    pub fn new(loader: Arc<dyn ScriptLoader>) -> Self {
        Self {
            loader,
            active: Mutex::new(None),
            load_lock: Mutex::new(()),
            state: AtomicU8::new(NodeState::Unloaded as u8),
            prepared: AtomicBool::new(false),
            sample_rate: AtomicF64::new(0.0),
            block_size: AtomicUsize::new(0),
            dsp_code: Mutex::new(String::new()),
            editor_code: Mutex::new(String::new()),
            ports: Mutex::new(Vec::new()),
            events: EventBus::new(),
            render_faults: AtomicU64::new(0),
        }
    }

    /// Create a node backed by a Rhai loader built from `config`.
    pub fn with_rhai(config: &NodeConfig) -> Self {
        Self::new(Arc::new(RhaiLoader::new(config)))
    }

    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_node_state(&self, state: NodeState) {
        let previous = self.state.swap(state as u8, Ordering::AcqRel);
        tracing::debug!(
            "ScriptNode: {:?} -> {:?}",
            NodeState::from_u8(previous),
            state
        );
    }

    /// Receive node events.
    pub fn subscribe(&self) -> Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /// Source of the active script (empty before the first successful load).
    pub fn dsp_code(&self) -> String {
        self.dsp_code.lock().clone()
    }

    /// Free-form editor text persisted alongside the script.
    pub fn editor_code(&self) -> String {
        self.editor_code.lock().clone()
    }

    pub fn set_editor_code(&self, code: impl Into<String>) {
        *self.editor_code.lock() = code.into();
    }

    /// Number of blocks whose `process` call failed.
    pub fn render_faults(&self) -> u64 {
        self.render_faults.load(Ordering::Relaxed)
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::Acquire)
    }

    /// Display name of the active script.
    pub fn script_name(&self) -> Option<String> {
        self.active.lock().as_ref().map(|i| i.name().to_string())
    }

    /// Validate, compile and hot-swap a new script.
    ///
    /// On failure the previously active script keeps running and the error
    /// is returned.
    pub fn load_script(&self, code: &str) -> Result<()> {
        let guard = self.load_lock.lock();
        self.load_locked(code, &guard)
    }

    fn load_locked(&self, code: &str, _guard: &MutexGuard<'_, ()>) -> Result<()> {
        let previous = self.state();
        if previous == NodeState::Released {
            return Err(ScriptError::NodeReleased);
        }

        self.set_node_state(NodeState::Validating);
        if let Err(e) = self.loader.validate(code) {
            return Err(self.reject(previous, e));
        }

        self.set_node_state(NodeState::Compiling);
        let mut candidate = match self.loader.compile(code) {
            Ok(candidate) => candidate,
            Err(e) => return Err(self.reject(previous, e)),
        };

        if self.is_prepared() {
            let sample_rate = self.sample_rate.load(Ordering::Acquire);
            let block_size = self.block_size.load(Ordering::Acquire);
            if let Err(e) = candidate.prepare(sample_rate, block_size) {
                return Err(self.reject(previous, e));
            }
        }

        self.set_node_state(NodeState::Swapping);
        let ports = candidate.ports().to_vec();
        *self.ports.lock() = ports.clone();
        self.events.send(NodeEvent::PortsChanged(ports));

        let name = candidate.name().to_string();
        let old = {
            let mut active = self.active.lock();
            if let Some(old) = active.as_deref() {
                candidate.copy_parameter_values(old);
            }
            active.replace(candidate)
        };

        *self.dsp_code.lock() = code.to_string();
        self.set_node_state(NodeState::Active);

        if let Some(mut old) = old {
            old.release();
            old.cleanup();
        }

        tracing::info!("Script '{}' is now active", name);
        self.events.send(NodeEvent::ScriptLoaded);
        Ok(())
    }

    fn reject(&self, previous: NodeState, error: ScriptError) -> ScriptError {
        self.set_node_state(previous);
        tracing::warn!("Script reload rejected: {}", error);
        self.events.send(NodeEvent::LoadFailed(error.to_string()));
        error
    }

    /// Per-sample parameter entry point.
    ///
    /// Takes the render-exclusion lock and commits nothing; parameter values
    /// are written through [`PortHost::parameter`] instead.
    pub fn set_parameter(&self, _index: usize, _value: f32) {
        let _active = self.active.lock();
    }

    /// Release the active script and refuse further loads.
    pub fn shutdown(&self) {
        let _guard = self.load_lock.lock();
        if self.state() == NodeState::Released {
            return;
        }

        let old = self.active.lock().take();
        if let Some(mut old) = old {
            old.release();
            old.cleanup();
        }
        self.prepared.store(false, Ordering::Release);
        self.set_node_state(NodeState::Released);
        self.events.send(NodeEvent::Released);
    }
}

impl Processor for ScriptNode {
    fn prepare_to_render(&self, sample_rate: f64, block_size: usize) {
        let _guard = self.load_lock.lock();
        if self.is_prepared() {
            return;
        }

        self.sample_rate.store(sample_rate, Ordering::Release);
        self.block_size.store(block_size, Ordering::Release);
        if let Some(instance) = self.active.lock().as_mut() {
            if let Err(e) = instance.prepare(sample_rate, block_size) {
                tracing::error!("Failed to prepare script '{}': {}", instance.name(), e);
            }
        }
        self.prepared.store(true, Ordering::Release);
        tracing::debug!("ScriptNode prepared at {} Hz, {} samples", sample_rate, block_size);
    }

    fn release_resources(&self) {
        let _guard = self.load_lock.lock();
        if !self.is_prepared() {
            return;
        }

        if let Some(instance) = self.active.lock().as_mut() {
            instance.release();
        }
        self.prepared.store(false, Ordering::Release);
        tracing::debug!("ScriptNode released resources");
    }

    fn render(&self, audio: &mut AudioBuffer, midi: &mut BufferPipe<'_>) {
        let mut active = self.active.lock();
        let Some(instance) = active.as_mut() else {
            return;
        };

        if let Err(e) = instance.process(audio, midi) {
            self.render_faults.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Render fault: {}", e);
        }
    }
}

impl PortHost for ScriptNode {
    fn refresh_ports(&self) {
        let ports = self
            .active
            .lock()
            .as_ref()
            .map(|i| i.ports().to_vec())
            .unwrap_or_default();
        *self.ports.lock() = ports.clone();
        self.events.send(NodeEvent::PortsChanged(ports));
    }

    fn ports(&self) -> Vec<Port> {
        self.ports.lock().clone()
    }

    fn parameter(&self, port: &Port) -> Option<SharedParameter> {
        if port.kind != PortType::Control {
            return None;
        }
        self.active
            .lock()
            .as_ref()
            .map(|i| i.parameter(port.channel, port.is_input()))
    }

    fn description(&self) -> PluginDescription {
        PluginDescription::script_node()
    }
}

impl Persistable for ScriptNode {
    fn get_state(&self) -> Result<Vec<u8>> {
        let blob = match self.active.lock().as_mut() {
            Some(instance) => instance.save()?,
            None => Vec::new(),
        };
        PersistedState::new(self.dsp_code(), self.editor_code(), blob).encode()
    }

    fn set_state(&self, data: &[u8]) -> Result<()> {
        let state = PersistedState::decode(data)?;

        let guard = self.load_lock.lock();
        self.load_locked(&state.dsp_code, &guard)?;
        *self.editor_code.lock() = state.editor_code;

        // The new script is committed at this point; a bad blob only leaves
        // it in its freshly compiled state.
        if let Some(blob) = state.data {
            if let Some(instance) = self.active.lock().as_mut() {
                if let Err(e) = instance.restore(&blob) {
                    tracing::warn!(
                        "Script '{}' could not restore {} bytes of state: {}",
                        instance.name(),
                        blob.len(),
                        e
                    );
                }
            }
        }
        drop(guard);

        tracing::info!("Restored script node state");
        self.events.send(NodeEvent::StateRestored);
        Ok(())
    }
}

impl Drop for ScriptNode {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ScriptNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptNode")
            .field("state", &self.state())
            .field("prepared", &self.is_prepared())
            .field("ports", &self.ports.lock().len())
            .field("render_faults", &self.render_faults())
            .finish()
    }
}
