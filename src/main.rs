//! Script node driver
//!
//! Loads a script into a node, renders a few blocks with a test note and
//! reports what happened.
//!
//! ```text
//! scriptnode-rs [SCRIPT_FILE | BUILTIN_NAME] [BLOCKS]
//! ```
//!
//! Without arguments the built-in gain script is used.

use anyhow::{bail, Context};
use scriptnode_rs::{
    config::NodeConfig,
    midi::{MidiBuffer, MidiMessage},
    node::{NodeEvent, Persistable, PortHost, Processor, ScriptNode},
    pipe::BufferPipe,
    scripting::builtins,
    AudioBuffer,
};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,scriptnode_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let script_arg = args.next().unwrap_or_else(|| "gain".to_string());
    let blocks: usize = match args.next() {
        Some(n) => n.parse().with_context(|| format!("Invalid block count: {}", n))?,
        None => 4,
    };

    let code = load_source(&script_arg)?;
    let config = NodeConfig::load_or_default();
    let render = config.render.clone();

    let node = ScriptNode::with_rhai(&config);
    let events = node.subscribe();

    node.load_script(&code)
        .with_context(|| format!("Failed to load script '{}'", script_arg))?;
    node.prepare_to_render(render.sample_rate, render.block_size);

    for event in events.try_iter() {
        match event {
            NodeEvent::PortsChanged(ports) => {
                tracing::info!("Script declares {} ports", ports.len());
                for port in &ports {
                    tracing::info!("  {} ({:?} {:?})", port.name, port.kind, port.direction);
                }
            }
            NodeEvent::ScriptLoaded => tracing::info!("Script loaded"),
            NodeEvent::LoadFailed(message) => tracing::warn!("Load failed: {}", message),
            NodeEvent::StateRestored => tracing::info!("State restored"),
            NodeEvent::Released => tracing::info!("Node released"),
        }
    }

    let mut audio = AudioBuffer::new(render.audio_channels, render.block_size);
    let mut midi = vec![MidiBuffer::with_capacity(config.pipe.midi_event_capacity)];

    for block in 0..blocks {
        for channel in 0..audio.num_channels() {
            audio.channel_mut(channel).fill(0.5);
        }
        midi[0].clear();
        midi[0].add_event(MidiMessage::note_on(0, 60, 100), 0);

        let mut pipe = BufferPipe::from_slice(&mut midi, 1);
        node.render(&mut audio, &mut pipe);

        tracing::info!(
            "Block {}: peak {:.3}, {} MIDI events",
            block,
            audio.peak(),
            midi[0].len()
        );
    }

    for port in node.ports() {
        if let Some(parameter) = node.parameter(&port) {
            tracing::info!("{} = {}", parameter.name(), parameter.value());
        }
    }

    let state = node.get_state().context("Failed to save node state")?;
    tracing::info!(
        "Persisted state is {} bytes, {} render faults",
        state.len(),
        node.render_faults()
    );

    node.release_resources();
    node.shutdown();
    Ok(())
}

/// Read a script file, or fall back to a built-in by name.
fn load_source(arg: &str) -> anyhow::Result<String> {
    let path = Path::new(arg);
    if path.exists() {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()));
    }
    match builtins::by_name(arg) {
        Some(code) => Ok(code.to_string()),
        None => bail!(
            "'{}' is neither a file nor a built-in script ({})",
            arg,
            builtins::ALL
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
