//! Rhai-backed script instance.

use crate::audio::AudioBuffer;
use crate::error::{Result, ResultExt, ScriptError};
use crate::node::{Port, PortDirection, PortType, MAX_PORT_CHANNEL};
use crate::parameter::{ParamKey, Parameter, ParameterRange, SharedParameter};
use crate::pipe::BufferPipe;
use crate::scripting::api::{AudioHandle, PipeHandle};
use crate::scripting::{ScriptInstance, ScriptRuntime};
use parking_lot::Mutex;
use rhai::{Array, CallFnOptions, Dynamic, EvalAltResult, FnPtr, FuncArgs, Map, Scope, AST, FLOAT, INT};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Names of the script functions backing each callback.
#[derive(Debug, Clone, Default)]
struct Callbacks {
    process: String,
    prepare: Option<String>,
    release: Option<String>,
    save: Option<String>,
    restore: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Callback {
    Process,
    Prepare,
    Release,
    Save,
    Restore,
}

impl Callbacks {
    fn get(&self, which: Callback) -> Option<&str> {
        match which {
            Callback::Process => Some(self.process.as_str()),
            Callback::Prepare => self.prepare.as_deref(),
            Callback::Release => self.release.as_deref(),
            Callback::Save => self.save.as_deref(),
            Callback::Restore => self.restore.as_deref(),
        }
    }
}

/// A compiled Rhai script and the object it returned.
pub struct RhaiScript {
    runtime: Arc<ScriptRuntime>,
    ast: AST,
    source: String,
    name: String,
    /// The returned map, bound as `this` for every callback
    state: Dynamic,
    scope: Scope<'static>,
    callbacks: Callbacks,
    ports: Vec<Port>,
    parameters: Mutex<BTreeMap<ParamKey, SharedParameter>>,
    audio: AudioHandle,
    midi: PipeHandle,
    prepared: bool,
}

impl RhaiScript {
    /// Wrap the value a script's top-level code returned.
    ///
    /// Fails with `Instantiation` when the value is not a map of the
    /// expected shape.
    pub(crate) fn instantiate(
        runtime: Arc<ScriptRuntime>,
        source: &str,
        ast: AST,
        value: Dynamic,
    ) -> Result<Self> {
        let type_name = value.type_name();
        let Some(mut map) = value.try_cast::<Map>() else {
            return Err(ScriptError::Instantiation(format!(
                "script must return an object map, got {}",
                type_name
            )));
        };

        let callbacks = Callbacks {
            process: required_callback(&ast, &map, "process", 2)?,
            prepare: optional_callback(&ast, &map, "prepare", 2)?,
            release: optional_callback(&ast, &map, "release", 0)?,
            save: optional_callback(&ast, &map, "save", 0)?,
            restore: optional_callback(&ast, &map, "restore", 1)?,
        };

        let ports = match map.get("ports") {
            Some(ports) => parse_ports(ports)?,
            None => Vec::new(),
        };

        let name = match map.get("name") {
            Some(name) => name
                .clone()
                .into_string()
                .map_err(|t| ScriptError::Instantiation(format!("`name` must be a string, got {}", t)))?,
            None => "Script".to_string(),
        };

        let mut parameters = BTreeMap::new();
        for port in &ports {
            if let (Some(key), Some(range)) = (port.param_key(), port.range) {
                parameters.insert(
                    key,
                    Parameter::shared(key.channel, key.input, port.name.clone(), range),
                );
            }
        }

        map.insert(
            "controls".into(),
            Dynamic::from_array(control_array(&parameters, true)),
        );
        map.insert(
            "control_outputs".into(),
            Dynamic::from_array(control_array(&parameters, false)),
        );

        tracing::debug!(
            "Instantiated script '{}' with {} ports and {} parameters",
            name,
            ports.len(),
            parameters.len()
        );

        let midi = PipeHandle::new(runtime.new_pipe());
        Ok(Self {
            runtime,
            ast,
            source: source.to_string(),
            name,
            state: Dynamic::from_map(map),
            scope: Scope::new(),
            callbacks,
            ports,
            parameters: Mutex::new(parameters),
            audio: AudioHandle::new(),
            midi,
            prepared: false,
        })
    }

    /// The map bound as `this`.
    pub fn state(&self) -> &Dynamic {
        &self.state
    }

    fn invoke(
        &mut self,
        which: Callback,
        args: impl FuncArgs,
    ) -> std::result::Result<Option<Dynamic>, Box<EvalAltResult>> {
        let Self {
            runtime,
            ast,
            state,
            scope,
            callbacks,
            ..
        } = self;
        let Some(name) = callbacks.get(which) else {
            return Ok(None);
        };

        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(state);
        runtime
            .engine()
            .call_fn_with_options::<Dynamic>(options, scope, ast, name, args)
            .map(Some)
    }
}

impl ScriptInstance for RhaiScript {
    fn source(&self) -> &str {
        &self.source
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn parameter(&self, channel: u32, input: bool) -> SharedParameter {
        let key = ParamKey::new(channel, input);
        self.parameters
            .lock()
            .entry(key)
            .or_insert_with(|| {
                let direction = PortDirection::from_input(input);
                let name = Port::new(PortType::Control, direction, channel).name;
                Parameter::shared(channel, input, name, ParameterRange::default())
            })
            .clone()
    }

    fn find_parameter(&self, channel: u32, input: bool) -> Option<SharedParameter> {
        self.parameters
            .lock()
            .get(&ParamKey::new(channel, input))
            .cloned()
    }

    fn for_each_parameter(&self, f: &mut dyn FnMut(&SharedParameter)) {
        for parameter in self.parameters.lock().values() {
            f(parameter);
        }
    }

    fn prepare(&mut self, sample_rate: f64, block_size: usize) -> Result<()> {
        if self.prepared {
            return Ok(());
        }

        self.invoke(
            Callback::Prepare,
            (sample_rate as FLOAT, block_size as INT),
        )
        .context("prepare callback failed")?;

        self.prepared = true;
        tracing::debug!(
            "Script '{}' prepared at {} Hz, {} samples",
            self.name,
            sample_rate,
            block_size
        );
        Ok(())
    }

    fn process(&mut self, audio: &mut AudioBuffer, midi: &mut BufferPipe<'_>) -> Result<()> {
        self.audio.swap_with(audio);
        self.midi.0.lock().swap_with(midi);

        let args = (self.audio.clone(), self.midi.clone());
        let result = self.invoke(Callback::Process, args);

        self.midi.0.lock().swap_with(midi);
        self.audio.swap_with(audio);

        result
            .map(|_| ())
            .map_err(|e| ScriptError::Render(e.to_string()))
    }

    fn release(&mut self) {
        if !self.prepared {
            return;
        }
        self.prepared = false;

        if let Err(e) = self.invoke(Callback::Release, ()) {
            tracing::warn!("Script '{}' release failed: {}", self.name, e);
        }
    }

    fn cleanup(&mut self) {
        self.midi.0.lock().clear();
        self.audio.0.lock().clear();
    }

    fn save(&mut self) -> Result<Vec<u8>> {
        let value = self
            .invoke(Callback::Save, ())
            .context("save callback failed")?;

        let Some(value) = value else {
            return Ok(Vec::new());
        };
        if value.is_unit() {
            return Ok(Vec::new());
        }
        if value.is_blob() {
            return Ok(value.cast::<rhai::Blob>());
        }
        if value.is_string() {
            return value
                .into_string()
                .map(String::into_bytes)
                .map_err(|t| ScriptError::Script(format!("save returned {}", t)));
        }
        Err(ScriptError::Script(format!(
            "save must return a blob or string, got {}",
            value.type_name()
        )))
    }

    fn restore(&mut self, data: &[u8]) -> Result<()> {
        if self.callbacks.restore.is_none() {
            if !data.is_empty() {
                tracing::debug!(
                    "Script '{}' has no restore callback, ignoring {} bytes",
                    self.name,
                    data.len()
                );
            }
            return Ok(());
        }

        self.invoke(Callback::Restore, (Dynamic::from_blob(data.to_vec()),))
            .map(|_| ())
            .context("restore callback failed")
    }

    fn is_prepared(&self) -> bool {
        self.prepared
    }
}

impl std::fmt::Debug for RhaiScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiScript")
            .field("name", &self.name)
            .field("ports", &self.ports.len())
            .field("prepared", &self.prepared)
            .field("runtime", &self.runtime)
            .finish()
    }
}

/// Whether `ast` defines a script function `name` taking `arity` parameters.
pub(crate) fn has_function(ast: &AST, name: &str, arity: usize) -> bool {
    ast.iter_functions()
        .any(|f| f.name == name && f.params.len() == arity)
}

/// Whether `ast` defines any script function, named or anonymous, taking
/// `arity` parameters.
pub(crate) fn has_function_of_arity(ast: &AST, arity: usize) -> bool {
    ast.iter_functions().any(|f| f.params.len() == arity)
}

fn optional_callback(ast: &AST, map: &Map, key: &str, arity: usize) -> Result<Option<String>> {
    let Some(value) = map.get(key) else {
        return Ok(None);
    };
    if value.is_unit() {
        return Ok(None);
    }

    let Some(fn_ptr) = value.clone().try_cast::<FnPtr>() else {
        return Err(ScriptError::Instantiation(format!(
            "`{}` must be a function pointer, got {}",
            key,
            value.type_name()
        )));
    };

    let name = fn_ptr.fn_name();
    if !has_function(ast, name, arity) {
        return Err(ScriptError::Instantiation(format!(
            "`{}` refers to {}, which is not a script function taking {} parameters",
            key, name, arity
        )));
    }
    Ok(Some(name.to_string()))
}

fn required_callback(ast: &AST, map: &Map, key: &str, arity: usize) -> Result<String> {
    optional_callback(ast, map, key, arity)?
        .ok_or_else(|| ScriptError::Instantiation(format!("script object has no `{}`", key)))
}

fn parse_ports(value: &Dynamic) -> Result<Vec<Port>> {
    let Some(entries) = value.clone().try_cast::<Array>() else {
        return Err(ScriptError::Instantiation(format!(
            "`ports` must be an array, got {}",
            value.type_name()
        )));
    };

    let mut ports: Vec<Port> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let port = parse_port(entry)
            .map_err(|e| ScriptError::Instantiation(format!("port {}: {}", index, e)))?;

        if ports
            .iter()
            .any(|p| p.kind == port.kind && p.direction == port.direction && p.channel == port.channel)
        {
            return Err(ScriptError::Instantiation(format!(
                "port {}: duplicate {} {:?} channel {}",
                index,
                port.kind.name(),
                port.direction,
                port.channel
            )));
        }
        ports.push(port);
    }
    Ok(ports)
}

fn parse_port(entry: Dynamic) -> std::result::Result<Port, String> {
    let type_name = entry.type_name();
    let map = entry
        .try_cast::<Map>()
        .ok_or_else(|| format!("expected a map, got {}", type_name))?;

    let kind_name = map
        .get("kind")
        .and_then(|v| v.clone().into_string().ok())
        .ok_or("missing `kind`")?;
    let kind = PortType::from_name(&kind_name)
        .ok_or_else(|| format!("unknown port kind `{}`", kind_name))?;

    let input = map
        .get("input")
        .map(|v| v.as_bool().map_err(|t| format!("`input` must be a bool, got {}", t)))
        .transpose()?
        .unwrap_or(true);

    let channel = match map.get("channel") {
        Some(v) => {
            let channel = v
                .as_int()
                .map_err(|t| format!("`channel` must be an int, got {}", t))?;
            u32::try_from(channel)
                .ok()
                .filter(|c| *c <= MAX_PORT_CHANNEL)
                .ok_or_else(|| {
                    format!("channel {} out of range (0..={})", channel, MAX_PORT_CHANNEL)
                })?
        }
        None => 0,
    };

    let direction = PortDirection::from_input(input);
    let mut port = Port::new(kind, direction, channel);

    if let Some(name) = map.get("name") {
        port.name = name
            .clone()
            .into_string()
            .map_err(|t| format!("`name` must be a string, got {}", t))?;
    }

    if kind == PortType::Control {
        let min = number_field(&map, "min")?.unwrap_or(0.0);
        let max = number_field(&map, "max")?.unwrap_or(1.0);
        let initial = number_field(&map, "initial")?.unwrap_or(min);
        port.range = Some(ParameterRange::new(min as f32, max as f32, initial as f32));
    }

    Ok(port)
}

fn number_field(map: &Map, key: &str) -> std::result::Result<Option<f64>, String> {
    match map.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_float()
            .or_else(|_| v.as_int().map(|i| i as FLOAT))
            .map(Some)
            .map_err(|t| format!("`{}` must be a number, got {}", key, t)),
    }
}

fn control_array(parameters: &BTreeMap<ParamKey, SharedParameter>, input: bool) -> Array {
    let mut controls = Array::new();
    for (key, parameter) in parameters.iter().filter(|(k, _)| k.input == input) {
        let index = key.channel as usize;
        if controls.len() <= index {
            controls.resize(index + 1, Dynamic::UNIT);
        }
        controls[index] = Dynamic::from(parameter.clone());
    }
    controls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::midi::{MidiBuffer, MidiMessage};
    use crate::scripting::builtins;

    fn compile(code: &str) -> Result<RhaiScript> {
        let runtime = Arc::new(ScriptRuntime::new(&NodeConfig::default()));
        let ast = runtime
            .engine()
            .compile(code)
            .map_err(|e| ScriptError::Compile(e.to_string()))?;
        let value = runtime
            .engine()
            .eval_ast::<Dynamic>(&ast)
            .map_err(|e| ScriptError::Compile(e.to_string()))?;
        RhaiScript::instantiate(runtime, code, ast, value)
    }

    #[test]
    fn test_gain_ports_and_parameter() {
        let script = compile(builtins::GAIN).unwrap();
        assert_eq!(script.name(), "Gain");
        assert_eq!(script.ports().len(), 5);

        let gain = script.find_parameter(0, true).unwrap();
        assert_eq!(gain.value(), 1.0);
        assert_eq!(gain.name(), "Gain");
        assert!(Arc::ptr_eq(&gain, &script.parameter(0, true)));
    }

    #[test]
    fn test_gain_process() {
        let mut script = compile(builtins::GAIN).unwrap();
        script.prepare(44_100.0, 4).unwrap();
        script.parameter(0, true).set_value(0.5);

        let mut audio = AudioBuffer::from_channels(vec![vec![1.0; 4], vec![-1.0; 4]]);
        let mut pipe = BufferPipe::new();
        script.process(&mut audio, &mut pipe).unwrap();

        assert_eq!(audio.channel(0), &[0.5; 4]);
        assert_eq!(audio.channel(1), &[-0.5; 4]);
    }

    #[test]
    fn test_lazy_parameter_identity() {
        let script = compile(builtins::PASSTHROUGH).unwrap();
        assert!(script.find_parameter(4, false).is_none());
        let a = script.parameter(4, false);
        let b = script.parameter(4, false);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_counter_save_restore() {
        let mut script = compile(builtins::EVENT_COUNTER).unwrap();
        script.prepare(44_100.0, 32).unwrap();

        let mut audio = AudioBuffer::new(0, 0);
        let mut buffers = vec![MidiBuffer::with_capacity(8)];
        for block in 0..3u8 {
            buffers[0].clear();
            buffers[0].add_event(MidiMessage::note_on(0, 60 + block, 100), 0);
            let mut pipe = BufferPipe::from_slice(&mut buffers, 1);
            script.process(&mut audio, &mut pipe).unwrap();
        }
        assert_eq!(script.parameter(0, false).value(), 3.0);

        let blob = script.save().unwrap();
        assert_eq!(blob.len(), 8);

        let mut fresh = compile(builtins::EVENT_COUNTER).unwrap();
        fresh.restore(&blob).unwrap();
        assert_eq!(fresh.parameter(0, false).value(), 3.0);
        assert_eq!(fresh.save().unwrap(), blob);
    }

    #[test]
    fn test_prepare_release_idempotent() {
        let mut script = compile(builtins::EVENT_COUNTER).unwrap();
        script.release();
        assert!(!script.is_prepared());
        script.prepare(48_000.0, 128).unwrap();
        script.prepare(48_000.0, 128).unwrap();
        assert!(script.is_prepared());
        script.release();
        script.release();
        assert!(!script.is_prepared());
    }

    #[test]
    fn test_non_map_is_instantiation_error() {
        let err = compile("42").unwrap_err();
        assert!(matches!(err, ScriptError::Instantiation(_)));
    }

    #[test]
    fn test_missing_process_is_instantiation_error() {
        let err = compile("fn process(a, m) {} #{ name: \"x\" }").unwrap_err();
        assert!(matches!(err, ScriptError::Instantiation(_)));
    }

    #[test]
    fn test_wrong_arity_is_instantiation_error() {
        let err = compile("fn process(a) {} #{ process: Fn(\"process\") }").unwrap_err();
        assert!(matches!(err, ScriptError::Instantiation(_)));
    }

    #[test]
    fn test_malformed_port_is_instantiation_error() {
        let code = r#"
            fn process(a, m) {}
            #{ process: Fn("process"), ports: [#{ kind: "video", input: true, channel: 0 }] }
        "#;
        let err = compile(code).unwrap_err();
        assert!(err.to_string().contains("unknown port kind"));
    }

    #[test]
    fn test_duplicate_port_rejected() {
        let code = r#"
            fn process(a, m) {}
            #{
                process: Fn("process"),
                ports: [
                    #{ kind: "midi", input: true, channel: 0 },
                    #{ kind: "midi", input: true, channel: 0 }
                ]
            }
        "#;
        assert!(matches!(compile(code), Err(ScriptError::Instantiation(_))));
    }

    #[test]
    fn test_huge_port_channel_is_rejected() {
        let code = r#"
            fn process(audio, midi) {}
            #{
                process: Fn("process"),
                ports: [#{ kind: "control", input: true, channel: 4000000000 }]
            }
        "#;
        let err = compile(code).unwrap_err();
        assert!(matches!(err, ScriptError::Instantiation(_)));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_highest_port_channel_is_accepted() {
        let code = format!(
            r#"
            fn process(audio, midi) {{}}
            #{{
                process: Fn("process"),
                ports: [#{{ kind: "control", input: false, channel: {} }}]
            }}
            "#,
            MAX_PORT_CHANNEL
        );
        let script = compile(&code).unwrap();
        assert!(script.find_parameter(MAX_PORT_CHANNEL, false).is_some());
        let outputs = script.state().read_lock::<Map>().unwrap()["control_outputs"]
            .clone()
            .into_array()
            .unwrap();
        assert_eq!(outputs.len(), MAX_PORT_CHANNEL as usize + 1);
    }

    #[test]
    fn test_callback_errors_carry_context() {
        let code = r#"
            fn process(audio, midi) {}
            fn restore(data) { throw "bad blob"; }
            #{ process: Fn("process"), restore: Fn("restore") }
        "#;
        let mut script = compile(code).unwrap();
        let err = script.restore(&[1, 2]).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("restore callback failed"));
        assert!(message.contains("bad blob"));
    }

    #[test]
    fn test_render_error_is_render_fault() {
        let code = r#"
            fn process(audio, midi) { throw "boom"; }
            #{ process: Fn("process") }
        "#;
        let mut script = compile(code).unwrap();
        let mut audio = AudioBuffer::new(1, 8);
        audio.set_sample(0, 0, 0.25);
        let mut pipe = BufferPipe::new();

        let err = script.process(&mut audio, &mut pipe).unwrap_err();
        assert!(matches!(err, ScriptError::Render(_)));
        // Host buffer is handed back even on failure
        assert_eq!(audio.sample(0, 0), Some(0.25));
    }

    #[test]
    fn test_state_persists_between_calls() {
        let code = r#"
            fn process(audio, midi) { this.calls += 1; }
            #{ process: Fn("process"), calls: 0 }
        "#;
        let mut script = compile(code).unwrap();
        let mut audio = AudioBuffer::new(1, 1);
        for _ in 0..4 {
            let mut pipe = BufferPipe::new();
            script.process(&mut audio, &mut pipe).unwrap();
        }
        let calls = script.state().read_lock::<Map>().unwrap()["calls"].as_int().unwrap();
        assert_eq!(calls, 4);
    }
}
