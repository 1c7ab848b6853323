//! Rhai implementation of [`ScriptLoader`].

use crate::config::NodeConfig;
use crate::error::{Result, ScriptError};
use crate::scripting::instance::{has_function_of_arity, RhaiScript};
use crate::scripting::{ScriptInstance, ScriptLoader, ScriptRuntime};
use rhai::{Dynamic, Scope};
use std::sync::Arc;

/// Compiles Rhai source into [`RhaiScript`] instances.
///
/// All instances share one runtime and therefore one MIDI buffer table.
#[derive(Debug, Clone)]
pub struct RhaiLoader {
    runtime: Arc<ScriptRuntime>,
}

impl RhaiLoader {
    pub fn new(config: &NodeConfig) -> Self {
        Self::with_runtime(Arc::new(ScriptRuntime::new(config)))
    }

    pub fn with_runtime(runtime: Arc<ScriptRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<ScriptRuntime> {
        &self.runtime
    }
}

impl Default for RhaiLoader {
    fn default() -> Self {
        Self::new(&NodeConfig::default())
    }
}

impl ScriptLoader for RhaiLoader {
    fn validate(&self, code: &str) -> Result<()> {
        let ast = self
            .runtime
            .engine()
            .compile(code)
            .map_err(|e| ScriptError::Validation(e.to_string()))?;

        // Any two-parameter function could back `process`; compile checks which one.
        if !has_function_of_arity(&ast, 2) {
            return Err(ScriptError::Validation(
                "script defines no function taking (audio, midi) that could serve as process"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn compile(&self, code: &str) -> Result<Box<dyn ScriptInstance>> {
        let engine = self.runtime.engine();
        let ast = engine
            .compile(code)
            .map_err(|e| ScriptError::Compile(e.to_string()))?;

        let mut scope = Scope::new();
        let value = engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|e| ScriptError::Compile(e.to_string()))?;

        let script = RhaiScript::instantiate(self.runtime.clone(), code, ast, value)?;
        tracing::debug!("Compiled script '{}'", script.name());
        Ok(Box::new(script))
    }
}
