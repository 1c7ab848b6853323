//! Reference-counted arena of MIDI buffers.
//!
//! Script-owned buffers live here. Native code and script handles hold a
//! [`BufferRef`] index rather than a pointer and release it explicitly.
//! A slot whose count drops to zero goes back on the free list with its
//! event storage intact, so reacquiring it does not allocate.

use crate::midi::MidiBuffer;
use parking_lot::Mutex;
use std::sync::Arc;

/// Table shared between native pipes and the script runtime
pub type SharedBufferTable = Arc<Mutex<BufferTable>>;

/// Stable index of a buffer in a [`BufferTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRef(u32);

impl BufferRef {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

struct Entry {
    buffer: MidiBuffer,
    refs: u32,
}

/// Indexed pool of MIDI buffers with explicit acquire/retain/release.
pub struct BufferTable {
    entries: Vec<Entry>,
    free: Vec<u32>,
    event_capacity: usize,
}

impl BufferTable {
    /// Create an empty table whose buffers preallocate `event_capacity` events.
    pub fn new(event_capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            event_capacity,
        }
    }

    /// Wrap into the shared form.
    pub fn shared(event_capacity: usize) -> SharedBufferTable {
        Arc::new(Mutex::new(Self::new(event_capacity)))
    }

    /// Take a buffer with a reference count of one.
    ///
    /// Reuses a freed slot if one exists, otherwise registers a new buffer.
    pub fn acquire(&mut self) -> BufferRef {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.buffer.clear();
            entry.refs = 1;
            return BufferRef(index);
        }

        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            buffer: MidiBuffer::with_capacity(self.event_capacity),
            refs: 1,
        });
        BufferRef(index)
    }

    /// Add a reference to a live buffer.
    pub fn retain(&mut self, r: BufferRef) {
        let entry = &mut self.entries[r.index()];
        debug_assert!(entry.refs > 0, "retain on freed buffer {}", r.0);
        entry.refs += 1;
    }

    /// Drop a reference. The slot is freed once no references remain.
    pub fn release(&mut self, r: BufferRef) {
        let Some(entry) = self.entries.get_mut(r.index()) else {
            debug_assert!(false, "release of unknown buffer {}", r.0);
            return;
        };
        if entry.refs == 0 {
            debug_assert!(false, "double release of buffer {}", r.0);
            return;
        }

        entry.refs -= 1;
        if entry.refs == 0 {
            entry.buffer.clear();
            self.free.push(r.0);
        }
    }

    #[inline]
    pub fn buffer(&self, r: BufferRef) -> &MidiBuffer {
        &self.entries[r.index()].buffer
    }

    #[inline]
    pub fn buffer_mut(&mut self, r: BufferRef) -> &mut MidiBuffer {
        &mut self.entries[r.index()].buffer
    }

    /// Two distinct buffers mutably at once.
    pub fn pair_mut(&mut self, a: BufferRef, b: BufferRef) -> Option<(&mut MidiBuffer, &mut MidiBuffer)> {
        let (a, b) = (a.index(), b.index());
        if a == b || a >= self.entries.len() || b >= self.entries.len() {
            return None;
        }
        if a < b {
            let (left, right) = self.entries.split_at_mut(b);
            Some((&mut left[a].buffer, &mut right[0].buffer))
        } else {
            let (left, right) = self.entries.split_at_mut(a);
            Some((&mut right[0].buffer, &mut left[b].buffer))
        }
    }

    pub fn ref_count(&self, r: BufferRef) -> u32 {
        self.entries.get(r.index()).map(|e| e.refs).unwrap_or(0)
    }

    /// Buffers currently referenced.
    pub fn live_count(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    /// Slots ever registered, live or free.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over every slot's buffer with its index.
    pub(crate) fn buffers_mut(&mut self) -> impl Iterator<Item = (usize, &mut MidiBuffer)> {
        self.entries
            .iter_mut()
            .enumerate()
            .map(|(i, e)| (i, &mut e.buffer))
    }
}

impl std::fmt::Debug for BufferTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferTable")
            .field("slots", &self.entries.len())
            .field("live", &self.live_count())
            .finish()
    }
}
