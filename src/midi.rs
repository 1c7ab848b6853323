//! RT-safe MIDI event storage.
//!
//! A `MidiBuffer` holds the events of one channel for one render block,
//! ordered by frame offset. Capacity is reserved up front; adding events on
//! the render thread never reallocates, a full buffer drops the event and
//! raises an overflow flag instead.

use crate::config::DEFAULT_MIDI_EVENT_CAPACITY;

/// A short (1-3 byte) channel or system message.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MidiMessage {
    bytes: [u8; 3],
    len: u8,
}

impl MidiMessage {
    /// Build a message from raw bytes. Extra bytes beyond three are ignored.
    pub fn from_bytes(data: &[u8]) -> Self {
        let len = data.len().min(3);
        let mut bytes = [0u8; 3];
        bytes[..len].copy_from_slice(&data[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    #[inline]
    pub fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            bytes: [status, data1 & 0x7F, data2 & 0x7F],
            len: Self::expected_len(status),
        }
    }

    /// Note on. `channel` is 0-based.
    #[inline]
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(0x90 | (channel & 0x0F), note, velocity)
    }

    /// Note off. `channel` is 0-based.
    #[inline]
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(0x80 | (channel & 0x0F), note, velocity)
    }

    #[inline]
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::new(0xB0 | (channel & 0x0F), controller, value)
    }

    #[inline]
    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::new(0xC0 | (channel & 0x0F), program, 0)
    }

    fn expected_len(status: u8) -> u8 {
        match status & 0xF0 {
            0xC0 | 0xD0 => 2,
            0xF0 => match status {
                0xF1 | 0xF3 => 2,
                0xF2 => 3,
                _ => 1,
            },
            _ => 3,
        }
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    #[inline]
    pub fn data1(&self) -> u8 {
        self.bytes[1]
    }

    #[inline]
    pub fn data2(&self) -> u8 {
        self.bytes[2]
    }

    /// 0-based channel for channel voice messages, `None` for system messages.
    #[inline]
    pub fn channel(&self) -> Option<u8> {
        if self.status() < 0xF0 {
            Some(self.status() & 0x0F)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        self.status() & 0xF0 == 0x90 && self.data2() > 0
    }

    /// Note offs include note-on with zero velocity.
    #[inline]
    pub fn is_note_off(&self) -> bool {
        let kind = self.status() & 0xF0;
        kind == 0x80 || (kind == 0x90 && self.data2() == 0)
    }

    #[inline]
    pub fn is_note(&self) -> bool {
        matches!(self.status() & 0xF0, 0x80 | 0x90 | 0xA0)
    }

    /// Shift a note message by `semitones`, clamping into 0..=127.
    pub fn transposed(&self, semitones: i32) -> Self {
        if !self.is_note() {
            return *self;
        }
        let mut out = *self;
        out.bytes[1] = (self.data1() as i32 + semitones).clamp(0, 127) as u8;
        out
    }
}

impl std::fmt::Debug for MidiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MidiMessage({:02X?})", self.bytes())
    }
}

/// A message stamped with its frame offset inside the current block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Offset within the current block (0 = first sample).
    pub frame: u32,
    pub message: MidiMessage,
}

impl MidiEvent {
    #[inline]
    pub fn new(frame: u32, message: MidiMessage) -> Self {
        Self { frame, message }
    }
}

/// Per-channel MIDI event buffer with preallocated capacity.
#[derive(Clone)]
pub struct MidiBuffer {
    events: Vec<MidiEvent>,
    overflowed: bool,
}

impl MidiBuffer {
    /// Create a buffer with the default event capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MIDI_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            overflowed: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    /// Returns true if any add failed since the last clear.
    #[inline]
    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Remove every event.
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
        self.overflowed = false;
    }

    /// Remove the events whose frame lies in `start..start + len`.
    pub fn clear_range(&mut self, start: u32, len: u32) {
        let end = start.saturating_add(len);
        self.events.retain(|e| e.frame < start || e.frame >= end);
    }

    /// Insert an event after any existing events at the same frame.
    ///
    /// Returns `false` (and sets the overflow flag) when the buffer is full.
    pub fn add_event(&mut self, message: MidiMessage, frame: u32) -> bool {
        if self.events.len() == self.events.capacity() {
            self.overflowed = true;
            return false;
        }
        let index = self.events.partition_point(|e| e.frame <= frame);
        self.events.insert(index, MidiEvent::new(frame, message));
        true
    }

    /// Exchange contents with another buffer without copying events.
    #[inline]
    pub fn swap_with(&mut self, other: &mut MidiBuffer) {
        std::mem::swap(self, other);
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&MidiEvent> {
        self.events.get(index)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &MidiEvent> {
        self.events.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[MidiEvent] {
        &self.events
    }

    /// Mutable access to events; frames must stay ordered.
    #[inline]
    pub fn events_mut(&mut self) -> &mut [MidiEvent] {
        &mut self.events
    }

    /// Keep only the events matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&MidiEvent) -> bool) {
        self.events.retain(keep);
    }
}

impl Default for MidiBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MidiBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiBuffer")
            .field("len", &self.events.len())
            .field("capacity", &self.events.capacity())
            .field("overflowed", &self.overflowed)
            .finish()
    }
}
