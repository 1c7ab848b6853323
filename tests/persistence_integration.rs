//! Integration tests for saving and restoring node state

mod common;

use common::{
    assert_float_eq,
    builders::{AudioBufferBuilder, MidiBufferBuilder},
    fakes::FakeLoader,
    render_block,
};
use scriptnode_rs::{
    node::{PersistedState, Port, PortType},
    scripting::builtins,
    NodeConfig, NodeEvent, NodeState, Persistable, PortHost, Processor, ScriptError, ScriptNode,
};
use std::sync::Arc;

fn events_port(node: &ScriptNode) -> Port {
    node.ports()
        .into_iter()
        .find(|p| p.kind == PortType::Control && !p.is_input())
        .expect("counter declares an output control")
}

fn count(node: &ScriptNode) -> f64 {
    node.parameter(&events_port(node)).unwrap().value() as f64
}

fn render_notes(node: &ScriptNode, notes: u32) {
    let mut builder = MidiBufferBuilder::new();
    for i in 0..notes {
        builder = builder.note_on(i, 60);
    }
    let mut midi = vec![builder.build()];
    let mut audio = AudioBufferBuilder::new().samples(32).build();
    render_block(node, &mut audio, &mut midi);
}

#[test]
fn test_state_round_trip_to_fresh_node() {
    let node = ScriptNode::with_rhai(&NodeConfig::default());
    node.load_script(builtins::EVENT_COUNTER).unwrap();
    node.set_editor_code("// counter with notes");
    node.prepare_to_render(48_000.0, 32);
    render_notes(&node, 3);
    render_notes(&node, 3);
    assert_float_eq(count(&node), 6.0, 1e-6);

    let bytes = node.get_state().unwrap();

    let restored = ScriptNode::with_rhai(&NodeConfig::default());
    let events = restored.subscribe();
    restored.set_state(&bytes).unwrap();

    assert_eq!(restored.state(), NodeState::Active);
    assert_eq!(restored.dsp_code(), builtins::EVENT_COUNTER);
    assert_eq!(restored.editor_code(), "// counter with notes");
    assert_float_eq(count(&restored), 6.0, 1e-6);
    assert!(events
        .try_iter()
        .any(|e| matches!(e, NodeEvent::StateRestored)));

    restored.prepare_to_render(48_000.0, 32);
    render_notes(&restored, 1);
    assert_float_eq(count(&restored), 7.0, 1e-6);
}

#[test]
fn test_state_layout() {
    let node = ScriptNode::with_rhai(&NodeConfig::default());
    node.load_script(builtins::EVENT_COUNTER).unwrap();
    node.prepare_to_render(48_000.0, 32);
    render_notes(&node, 2);

    let state = PersistedState::decode(&node.get_state().unwrap()).unwrap();
    assert_eq!(state.dsp_code, builtins::EVENT_COUNTER);
    assert_eq!(state.editor_code, "");
    assert_eq!(state.data, Some(vec![2, 0, 0, 0, 0, 0, 0, 0]));
}

#[test]
fn test_script_without_save_omits_data() {
    let node = ScriptNode::with_rhai(&NodeConfig::default());
    node.load_script(builtins::GAIN).unwrap();

    let state = PersistedState::decode(&node.get_state().unwrap()).unwrap();
    assert_eq!(state.data, None);
}

#[test]
fn test_corrupt_state_is_rejected() {
    let node = ScriptNode::with_rhai(&NodeConfig::default());
    node.load_script(builtins::GAIN).unwrap();

    let err = node.set_state(b"definitely not gzip").unwrap_err();
    assert!(matches!(err, ScriptError::State(_)));
    assert_eq!(node.dsp_code(), builtins::GAIN);
    assert_eq!(node.state(), NodeState::Active);
}

#[test]
fn test_state_with_invalid_code_changes_nothing() {
    let node = Arc::new(ScriptNode::new(Arc::new(FakeLoader::new())));
    node.load_script("fake:0.5").unwrap();
    node.set_editor_code("kept");

    let bytes = PersistedState::new("not fake", "replaced", vec![1, 2, 3])
        .encode()
        .unwrap();
    let err = node.set_state(&bytes).unwrap_err();

    assert!(err.is_reload_failure());
    assert_eq!(node.dsp_code(), "fake:0.5");
    assert_eq!(node.editor_code(), "kept");
}

#[test]
fn test_empty_node_state() {
    let node = ScriptNode::with_rhai(&NodeConfig::default());
    let state = PersistedState::decode(&node.get_state().unwrap()).unwrap();
    assert_eq!(state, PersistedState::default());
}
