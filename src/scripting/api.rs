//! Script-facing types and functions.
//!
//! ## Types
//!
//! - `AudioBuffer` - `channels()`, `len()`, `get(ch, i)`, `set(ch, i, v)`, `apply_gain(g)`, `clear()`
//! - `MidiPipe` - `size()`, `get(i)`, `resize(n)`, `clear()`; `midi_pipe(n)` creates one
//! - `MidiBuffer` - `len()`, `clear()`, `add(frame, status, d1, d2)`, `note_on(frame, ch, note, vel)`,
//!   `note_off(frame, ch, note)`, `event(i)`, `events()`, `transpose(n)`, `keep_channel(ch)`,
//!   `swap_with(other)`
//! - `Parameter` - `value` (read/write, clamped), `channel`, `name`, `min`, `max`
//!
//! ## Math Functions
//!
//! - `db_to_gain(db)`, `gain_to_db(gain)`
//! - `clamp(x, lo, hi)`, `lerp(a, b, t)`, `pi()`
//!
//! Index errors inside scripts raise a script error instead of trapping.

use crate::audio::AudioBuffer;
use crate::midi::{MidiBuffer, MidiMessage};
use crate::parameter::SharedParameter;
use crate::pipe::{BufferRef, ManagedBufferPipe, SharedBufferTable};
use parking_lot::Mutex;
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, FLOAT, INT};
use std::sync::Arc;

type FnResult<T> = std::result::Result<T, Box<EvalAltResult>>;

fn script_error<T>(message: String) -> FnResult<T> {
    Err(message.into())
}

/// Audio block shared with a running script.
#[derive(Clone, Default)]
pub struct AudioHandle(pub(crate) Arc<Mutex<AudioBuffer>>);

impl AudioHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exchange contents with a host buffer.
    #[inline]
    pub fn swap_with(&self, buffer: &mut AudioBuffer) {
        self.0.lock().swap_with(buffer);
    }

    fn channels(&mut self) -> INT {
        self.0.lock().num_channels() as INT
    }

    fn len(&mut self) -> INT {
        self.0.lock().num_samples() as INT
    }

    fn get(&mut self, channel: INT, index: INT) -> FnResult<FLOAT> {
        let buffer = self.0.lock();
        match buffer.sample(to_index(channel), to_index(index)) {
            Some(sample) => Ok(sample as FLOAT),
            None => script_error(format!("sample ({}, {}) out of range", channel, index)),
        }
    }

    fn set(&mut self, channel: INT, index: INT, value: FLOAT) -> FnResult<()> {
        if self
            .0
            .lock()
            .set_sample(to_index(channel), to_index(index), value as f32)
        {
            Ok(())
        } else {
            script_error(format!("sample ({}, {}) out of range", channel, index))
        }
    }
}

/// Reference-counted handle to a MIDI buffer in the shared table.
///
/// Cloning adds a table reference, dropping removes it.
pub struct MidiBufferHandle {
    table: SharedBufferTable,
    buffer: BufferRef,
}

impl MidiBufferHandle {
    /// Wrap `buffer`, taking a new reference to it.
    pub fn retained(table: SharedBufferTable, buffer: BufferRef) -> Self {
        table.lock().retain(buffer);
        Self { table, buffer }
    }

    pub fn buffer_ref(&self) -> BufferRef {
        self.buffer
    }

    fn with<R>(&self, f: impl FnOnce(&mut MidiBuffer) -> R) -> R {
        let mut table = self.table.lock();
        f(table.buffer_mut(self.buffer))
    }

    fn len(&mut self) -> INT {
        self.with(|b| b.len() as INT)
    }

    fn clear(&mut self) {
        self.with(MidiBuffer::clear)
    }

    fn add(&mut self, frame: INT, status: INT, data1: INT, data2: INT) -> bool {
        let message = MidiMessage::new(to_byte(status), to_byte(data1), to_byte(data2));
        self.with(|b| b.add_event(message, to_frame(frame)))
    }

    fn note_on(&mut self, frame: INT, channel: INT, note: INT, velocity: INT) -> bool {
        let message = MidiMessage::note_on(to_byte(channel), to_byte(note), to_byte(velocity));
        self.with(|b| b.add_event(message, to_frame(frame)))
    }

    fn note_off(&mut self, frame: INT, channel: INT, note: INT) -> bool {
        let message = MidiMessage::note_off(to_byte(channel), to_byte(note), 0);
        self.with(|b| b.add_event(message, to_frame(frame)))
    }

    fn event(&mut self, index: INT) -> FnResult<Map> {
        let event = self.with(|b| b.get(to_index(index)).copied());
        match event {
            Some(event) => Ok(event_map(event.frame, &event.message)),
            None => script_error(format!("event {} out of range", index)),
        }
    }

    fn events(&mut self) -> Array {
        self.with(|b| {
            b.iter()
                .map(|e| Dynamic::from_map(event_map(e.frame, &e.message)))
                .collect()
        })
    }

    fn transpose(&mut self, semitones: INT) {
        let semitones = semitones.clamp(-127, 127) as i32;
        self.with(|b| {
            for event in b.events_mut() {
                event.message = event.message.transposed(semitones);
            }
        })
    }

    /// Drop channel messages not on `channel` (0-based). System messages stay.
    fn keep_channel(&mut self, channel: INT) {
        let channel = to_byte(channel) & 0x0F;
        self.with(|b| b.retain(|e| e.message.channel().map_or(true, |c| c == channel)))
    }

    fn swap_with(&mut self, other: MidiBufferHandle) {
        if self.buffer == other.buffer {
            return;
        }
        let mut table = self.table.lock();
        if let Some((a, b)) = table.pair_mut(self.buffer, other.buffer) {
            a.swap_with(b);
        }
    }
}

impl Clone for MidiBufferHandle {
    fn clone(&self) -> Self {
        Self::retained(self.table.clone(), self.buffer)
    }
}

impl Drop for MidiBufferHandle {
    fn drop(&mut self) {
        self.table.lock().release(self.buffer);
    }
}

/// Script view of a managed pipe.
#[derive(Clone)]
pub struct PipeHandle(pub(crate) Arc<Mutex<ManagedBufferPipe>>);

impl PipeHandle {
    pub fn new(pipe: ManagedBufferPipe) -> Self {
        Self(Arc::new(Mutex::new(pipe)))
    }

    pub fn pipe(&self) -> &Arc<Mutex<ManagedBufferPipe>> {
        &self.0
    }

    fn size(&mut self) -> INT {
        self.0.lock().num_buffers() as INT
    }

    fn get(&mut self, index: INT) -> FnResult<MidiBufferHandle> {
        let pipe = self.0.lock();
        let i = to_index(index);
        if i >= pipe.num_buffers() {
            return script_error(format!(
                "pipe index {} out of range (size {})",
                index,
                pipe.num_buffers()
            ));
        }
        Ok(MidiBufferHandle::retained(
            pipe.table().clone(),
            pipe.buffer_ref(i),
        ))
    }

    fn resize(&mut self, size: INT) {
        self.0.lock().set_size(size.max(0) as usize);
    }

    fn clear(&mut self) {
        self.0.lock().clear();
    }
}

fn event_map(frame: u32, message: &MidiMessage) -> Map {
    let mut map = Map::new();
    map.insert("frame".into(), Dynamic::from_int(frame as INT));
    map.insert("status".into(), Dynamic::from_int(message.status() as INT));
    map.insert("data1".into(), Dynamic::from_int(message.data1() as INT));
    map.insert("data2".into(), Dynamic::from_int(message.data2() as INT));
    map
}

#[inline]
fn to_index(value: INT) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[inline]
fn to_byte(value: INT) -> u8 {
    value.clamp(0, 255) as u8
}

#[inline]
fn to_frame(value: INT) -> u32 {
    value.clamp(0, u32::MAX as INT) as u32
}

/// Register every script-facing type and helper on `engine`.
pub(crate) fn register(engine: &mut Engine, table: SharedBufferTable) {
    // ===== Audio =====
    engine
        .register_type_with_name::<AudioHandle>("AudioBuffer")
        .register_fn("channels", AudioHandle::channels)
        .register_fn("len", AudioHandle::len)
        .register_fn("get", AudioHandle::get)
        .register_fn("set", AudioHandle::set)
        .register_fn("apply_gain", |audio: &mut AudioHandle, gain: FLOAT| {
            audio.0.lock().apply_gain(gain as f32)
        })
        .register_fn("clear", |audio: &mut AudioHandle| audio.0.lock().clear());

    // ===== MIDI =====
    engine
        .register_type_with_name::<MidiBufferHandle>("MidiBuffer")
        .register_fn("len", MidiBufferHandle::len)
        .register_fn("clear", MidiBufferHandle::clear)
        .register_fn("add", MidiBufferHandle::add)
        .register_fn("note_on", MidiBufferHandle::note_on)
        .register_fn("note_off", MidiBufferHandle::note_off)
        .register_fn("event", MidiBufferHandle::event)
        .register_fn("events", MidiBufferHandle::events)
        .register_fn("transpose", MidiBufferHandle::transpose)
        .register_fn("keep_channel", MidiBufferHandle::keep_channel)
        .register_fn("swap_with", MidiBufferHandle::swap_with);

    engine
        .register_type_with_name::<PipeHandle>("MidiPipe")
        .register_fn("size", PipeHandle::size)
        .register_fn("get", PipeHandle::get)
        .register_fn("resize", PipeHandle::resize)
        .register_fn("clear", PipeHandle::clear);

    engine.register_fn("midi_pipe", move |size: INT| -> PipeHandle {
        PipeHandle::new(ManagedBufferPipe::with_size(
            table.clone(),
            size.max(0) as usize,
        ))
    });

    // ===== Parameters =====
    engine
        .register_type_with_name::<SharedParameter>("Parameter")
        .register_get_set(
            "value",
            |p: &mut SharedParameter| p.value() as FLOAT,
            |p: &mut SharedParameter, value: FLOAT| p.set_value(value as f32),
        )
        .register_get("channel", |p: &mut SharedParameter| p.channel() as INT)
        .register_get("name", |p: &mut SharedParameter| p.name().to_string())
        .register_get("min", |p: &mut SharedParameter| p.range().min as FLOAT)
        .register_get("max", |p: &mut SharedParameter| p.range().max as FLOAT);

    // ===== Mathematical Functions =====
    engine.register_fn("db_to_gain", |db: FLOAT| -> FLOAT { 10f64.powf(db / 20.0) });
    engine.register_fn("gain_to_db", |gain: FLOAT| -> FLOAT {
        20.0 * gain.abs().max(1e-10).log10()
    });
    engine.register_fn("clamp", |x: FLOAT, lo: FLOAT, hi: FLOAT| -> FLOAT {
        if lo <= hi {
            x.clamp(lo, hi)
        } else {
            x.clamp(hi, lo)
        }
    });
    engine.register_fn("clamp", |x: INT, lo: INT, hi: INT| -> INT {
        x.clamp(lo.min(hi), lo.max(hi))
    });
    engine.register_fn("lerp", |a: FLOAT, b: FLOAT, t: FLOAT| -> FLOAT { a + (b - a) * t });
    engine.register_fn("pi", || std::f64::consts::PI);
}
