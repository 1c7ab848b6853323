//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod fakes;

use scriptnode_rs::{AudioBuffer, BufferPipe, MidiBuffer, Processor, ScriptNode};

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Render one block through `node` with all of `midi` wired into the pipe
pub fn render_block(node: &ScriptNode, audio: &mut AudioBuffer, midi: &mut [MidiBuffer]) {
    let count = midi.len();
    let mut pipe = BufferPipe::from_slice(midi, count);
    node.render(audio, &mut pipe);
}
