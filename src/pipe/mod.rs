//! Multi-channel MIDI buffer pipes.
//!
//! A pipe is an ordered handle to several channel buffers used for one render
//! cycle. Two flavours exist:
//!
//! - [`BufferPipe`] borrows buffers owned elsewhere (the graph or the host).
//!   It has a fixed capacity of [`MAX_REFERENCED_BUFFERS`] slots and never
//!   allocates.
//! - [`ManagedBufferPipe`] owns its buffers through a reference-counted
//!   [`BufferTable`] shared with the script runtime. It grows lazily and
//!   shrinks without releasing anything.
//!
//! Index access on both is a contract: callers on the render path must stay
//! within `0..num_buffers()`. Violations are caught by a debug assertion and
//! trap in every build; there is no bounds recovery.

mod managed;
mod table;

pub use managed::ManagedBufferPipe;
pub use table::{BufferRef, BufferTable, SharedBufferTable};

use crate::midi::MidiBuffer;

/// Maximum number of buffers a `BufferPipe` can reference.
pub const MAX_REFERENCED_BUFFERS: usize = 32;

/// Fixed-capacity, non-owning view over a sequence of MIDI buffers.
pub struct BufferPipe<'a> {
    slots: [Option<&'a mut MidiBuffer>; MAX_REFERENCED_BUFFERS],
    size: usize,
}

impl<'a> BufferPipe<'a> {
    /// An empty pipe.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            size: 0,
        }
    }

    /// Reference the first `count` buffers of `buffers`.
    pub fn from_slice(buffers: &'a mut [MidiBuffer], count: usize) -> Self {
        debug_assert!(count <= buffers.len());
        debug_assert!(count <= MAX_REFERENCED_BUFFERS);

        let mut pipe = Self::new();
        for (slot, buffer) in pipe.slots.iter_mut().zip(buffers.iter_mut().take(count)) {
            *slot = Some(buffer);
            pipe.size += 1;
        }
        pipe
    }

    /// Project the buffers at `channels` (in that order) out of `buffers`.
    ///
    /// Each channel must name a distinct, existing buffer.
    pub fn from_channels(buffers: &'a mut [MidiBuffer], channels: &[usize]) -> Self {
        let size = channels.len().min(MAX_REFERENCED_BUFFERS);
        let channels = &channels[..size];
        Self::project(buffers.iter_mut().enumerate(), size, |index| {
            channels.iter().position(|&c| c == index)
        })
    }

    /// Place each `(index, buffer)` at the pipe position `position_of(index)`
    /// returns, skipping buffers it maps to `None`.
    pub(crate) fn project<I, F>(buffers: I, size: usize, position_of: F) -> Self
    where
        I: Iterator<Item = (usize, &'a mut MidiBuffer)>,
        F: Fn(usize) -> Option<usize>,
    {
        debug_assert!(size <= MAX_REFERENCED_BUFFERS);

        let mut pipe = Self::new();
        let size = size.min(MAX_REFERENCED_BUFFERS);
        for (index, buffer) in buffers {
            if let Some(position) = position_of(index).filter(|&p| p < size) {
                pipe.slots[position] = Some(buffer);
            }
        }

        debug_assert!(
            pipe.slots[..size].iter().all(Option::is_some),
            "pipe positions must map to distinct existing buffers"
        );
        pipe.size = size;
        pipe
    }

    /// Number of referenced buffers.
    #[inline]
    pub fn num_buffers(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Buffer at `index`. Requires `index < num_buffers()`.
    #[inline]
    pub fn read_buffer(&self, index: usize) -> &MidiBuffer {
        debug_assert!(
            index < self.size,
            "pipe index {} out of range (size {})",
            index,
            self.size
        );
        match &self.slots[index] {
            Some(buffer) => &**buffer,
            None => index_contract_breach(index, self.size),
        }
    }

    /// Mutable buffer at `index`. Requires `index < num_buffers()`.
    #[inline]
    pub fn write_buffer(&mut self, index: usize) -> &mut MidiBuffer {
        debug_assert!(
            index < self.size,
            "pipe index {} out of range (size {})",
            index,
            self.size
        );
        let size = self.size;
        match &mut self.slots[index] {
            Some(buffer) => &mut **buffer,
            None => index_contract_breach(index, size),
        }
    }

    /// Clear every active buffer.
    pub fn clear(&mut self) {
        for buffer in self.slots[..self.size].iter_mut().flatten() {
            buffer.clear();
        }
    }

    /// Clear the events in `start..start + len` on every active buffer.
    pub fn clear_range(&mut self, start: u32, len: u32) {
        for buffer in self.slots[..self.size].iter_mut().flatten() {
            buffer.clear_range(start, len);
        }
    }

    /// Clear the events in `start..start + len` on one buffer.
    pub fn clear_channel(&mut self, channel: usize, start: u32, len: u32) {
        self.write_buffer(channel).clear_range(start, len);
    }

    /// Iterate over the active buffers.
    pub fn iter(&self) -> impl Iterator<Item = &MidiBuffer> {
        self.slots[..self.size].iter().flatten().map(|b| &**b)
    }
}

impl Default for BufferPipe<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BufferPipe<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPipe")
            .field("size", &self.size)
            .finish()
    }
}

#[cold]
#[inline(never)]
fn index_contract_breach(index: usize, size: usize) -> ! {
    panic!("pipe index {} out of range (size {})", index, size)
}
