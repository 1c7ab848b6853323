//! Shared Rhai runtime for script instances.
//!
//! One `ScriptRuntime` holds the configured engine and the MIDI buffer table
//! used by every instance it compiles. Script `print` and `debug` output is
//! routed to `tracing`.

use crate::config::{EngineLimits, NodeConfig, PipeSettings};
use crate::pipe::{BufferTable, ManagedBufferPipe, SharedBufferTable};
use crate::scripting::api;
use rhai::Engine;

/// Configured Rhai engine plus the buffer table its scripts allocate from.
pub struct ScriptRuntime {
    engine: Engine,
    table: SharedBufferTable,
    pipe: PipeSettings,
}

impl ScriptRuntime {
    /// Create a runtime from node configuration
    pub fn new(config: &NodeConfig) -> Self {
        let table = BufferTable::shared(config.pipe.midi_event_capacity);
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, &config.engine, table.clone());

        Self {
            engine,
            table,
            pipe: config.pipe.clone(),
        }
    }

    /// Configure the Rhai engine with safety limits and the audio API
    fn configure_engine(engine: &mut Engine, limits: &EngineLimits, table: SharedBufferTable) {
        // Set safety limits
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_operations(limits.max_operations);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);

        engine.on_print(|text| tracing::info!(target: "script", "{}", text));
        engine.on_debug(|text, source, pos| match source {
            Some(source) => tracing::debug!(target: "script", "{} @ {:?}: {}", source, pos, text),
            None => tracing::debug!(target: "script", "{:?}: {}", pos, text),
        });

        api::register(engine, table);
    }

    /// Get the underlying engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Get the buffer table shared with scripts
    pub fn table(&self) -> &SharedBufferTable {
        &self.table
    }

    pub fn pipe_settings(&self) -> &PipeSettings {
        &self.pipe
    }

    /// A pipe sized to the configured number of reserved buffers
    pub fn new_pipe(&self) -> ManagedBufferPipe {
        ManagedBufferPipe::with_size(self.table.clone(), self.pipe.initial_midi_buffers)
    }
}

impl Default for ScriptRuntime {
    fn default() -> Self {
        Self::new(&NodeConfig::default())
    }
}

impl std::fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("table", &*self.table.lock())
            .field("pipe", &self.pipe)
            .finish()
    }
}
