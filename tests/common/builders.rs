//! Test data builders for audio and MIDI buffers

use scriptnode_rs::{AudioBuffer, MidiBuffer, MidiMessage};

/// Builder for creating test AudioBuffers
pub struct AudioBufferBuilder {
    channels: usize,
    samples: usize,
    fill: f32,
}

impl AudioBufferBuilder {
    pub fn new() -> Self {
        Self {
            channels: 2,
            samples: 64,
            fill: 0.0,
        }
    }

    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Fill every sample with a constant
    pub fn constant(mut self, value: f32) -> Self {
        self.fill = value;
        self
    }

    pub fn build(self) -> AudioBuffer {
        AudioBuffer::from_channels(vec![vec![self.fill; self.samples]; self.channels])
    }
}

/// Builder for creating test MidiBuffers
pub struct MidiBufferBuilder {
    capacity: usize,
    events: Vec<(u32, MidiMessage)>,
}

impl MidiBufferBuilder {
    pub fn new() -> Self {
        Self {
            capacity: 64,
            events: Vec::new(),
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn note_on(mut self, frame: u32, note: u8) -> Self {
        self.events.push((frame, MidiMessage::note_on(0, note, 100)));
        self
    }

    pub fn note_off(mut self, frame: u32, note: u8) -> Self {
        self.events.push((frame, MidiMessage::note_off(0, note, 0)));
        self
    }

    pub fn message(mut self, frame: u32, message: MidiMessage) -> Self {
        self.events.push((frame, message));
        self
    }

    pub fn build(self) -> MidiBuffer {
        let mut buffer = MidiBuffer::with_capacity(self.capacity);
        for (frame, message) in self.events {
            buffer.add_event(message, frame);
        }
        buffer
    }
}

/// Frames of every event in a buffer
pub fn frames(buffer: &MidiBuffer) -> Vec<u32> {
    buffer.iter().map(|e| e.frame).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_builder() {
        let buffer = MidiBufferBuilder::new().note_on(10, 60).note_off(5, 60).build();
        assert_eq!(frames(&buffer), vec![5, 10]);
    }

    #[test]
    fn test_audio_builder() {
        let audio = AudioBufferBuilder::new().channels(1).samples(8).constant(0.5).build();
        assert_eq!(audio.num_channels(), 1);
        assert_eq!(audio.channel(0), &[0.5; 8]);
    }
}
