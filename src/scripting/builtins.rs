//! Scripts shipped with the crate.
//!
//! Useful as starting points for users and as known-good fixtures.

/// Leaves audio and MIDI untouched.
pub const PASSTHROUGH: &str = r#"
fn process(audio, midi) {
}

#{
    name: "Passthrough",
    process: Fn("process"),
    ports: [
        #{ kind: "audio", input: true, channel: 0 },
        #{ kind: "audio", input: true, channel: 1 },
        #{ kind: "audio", input: false, channel: 0 },
        #{ kind: "audio", input: false, channel: 1 },
        #{ kind: "midi", input: true, channel: 0 },
        #{ kind: "midi", input: false, channel: 0 }
    ]
}
"#;

/// Scales every sample by control 0.
pub const GAIN: &str = r#"
fn process(audio, midi) {
    audio.apply_gain(this.controls[0].value);
}

#{
    name: "Gain",
    process: Fn("process"),
    ports: [
        #{ kind: "audio", input: true, channel: 0 },
        #{ kind: "audio", input: true, channel: 1 },
        #{ kind: "audio", input: false, channel: 0 },
        #{ kind: "audio", input: false, channel: 1 },
        #{ kind: "control", input: true, channel: 0, name: "Gain", min: 0.0, max: 2.0, initial: 1.0 }
    ]
}
"#;

/// Shifts note messages on every MIDI buffer by control 0 semitones.
pub const MIDI_TRANSPOSE: &str = r#"
fn process(audio, midi) {
    let semitones = this.controls[0].value.round().to_int();
    if semitones == 0 {
        return;
    }
    for i in 0..midi.size() {
        midi.get(i).transpose(semitones);
    }
}

#{
    name: "Transpose",
    process: Fn("process"),
    ports: [
        #{ kind: "midi", input: true, channel: 0 },
        #{ kind: "midi", input: false, channel: 0 },
        #{ kind: "control", input: true, channel: 0, name: "Semitones", min: -24.0, max: 24.0, initial: 0.0 }
    ]
}
"#;

/// Keeps only channel messages on the MIDI channel selected by control 0.
pub const MIDI_CHANNEL_FILTER: &str = r#"
fn process(audio, midi) {
    let channel = this.controls[0].value.round().to_int();
    for i in 0..midi.size() {
        midi.get(i).keep_channel(channel);
    }
}

#{
    name: "Channel Filter",
    process: Fn("process"),
    ports: [
        #{ kind: "midi", input: true, channel: 0 },
        #{ kind: "midi", input: false, channel: 0 },
        #{ kind: "control", input: true, channel: 0, name: "Channel", min: 0.0, max: 15.0, initial: 0.0 }
    ]
}
"#;

/// Counts MIDI events and persists the count through save/restore.
///
/// The running total is mirrored to output control 0.
pub const EVENT_COUNTER: &str = r#"
fn prepare(sample_rate, block_size) {
    this.blocks = 0;
}

fn process(audio, midi) {
    for i in 0..midi.size() {
        this.count += midi.get(i).len();
    }
    this.blocks += 1;
    this.control_outputs[0].value = this.count.to_float();
}

fn release() {
    this.blocks = 0;
}

fn save() {
    let data = blob();
    let value = this.count;
    for i in 0..8 {
        data.push(value & 255);
        value = value >> 8;
    }
    data
}

fn restore(data) {
    let value = 0;
    for i in 0..data.len() {
        value = value | (data[i] << (8 * i));
    }
    this.count = value;
    this.control_outputs[0].value = value.to_float();
}

#{
    name: "Event Counter",
    count: 0,
    blocks: 0,
    prepare: Fn("prepare"),
    process: Fn("process"),
    release: Fn("release"),
    save: Fn("save"),
    restore: Fn("restore"),
    ports: [
        #{ kind: "midi", input: true, channel: 0 },
        #{ kind: "control", input: false, channel: 0, name: "Events", min: 0.0, max: 1000000.0, initial: 0.0 }
    ]
}
"#;

/// Every builtin with its name.
pub const ALL: &[(&str, &str)] = &[
    ("passthrough", PASSTHROUGH),
    ("gain", GAIN),
    ("midi_transpose", MIDI_TRANSPOSE),
    ("midi_channel_filter", MIDI_CHANNEL_FILTER),
    ("event_counter", EVENT_COUNTER),
];

/// Look up a builtin by name.
pub fn by_name(name: &str) -> Option<&'static str> {
    ALL.iter().find(|(n, _)| *n == name).map(|(_, code)| *code)
}
