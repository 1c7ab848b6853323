//! Pipe whose buffers are owned through the shared buffer table.

use super::table::{BufferRef, BufferTable, SharedBufferTable};
use super::{index_contract_breach, BufferPipe};
use crate::midi::MidiBuffer;
use parking_lot::{MappedMutexGuard, MutexGuard};

/// A buffer pipe that owns its MIDI buffers.
///
/// The physical set of buffers only grows. Shrinking changes the logical
/// size (`num_buffers`) and keeps every buffer registered for reuse. All
/// references are released back to the table on drop.
pub struct ManagedBufferPipe {
    table: SharedBufferTable,
    refs: Vec<BufferRef>,
    used: usize,
}

impl ManagedBufferPipe {
    /// An empty pipe drawing buffers from `table`.
    pub fn new(table: SharedBufferTable) -> Self {
        Self {
            table,
            refs: Vec::new(),
            used: 0,
        }
    }

    /// A pipe with `size` buffers reserved up front.
    pub fn with_size(table: SharedBufferTable, size: usize) -> Self {
        let mut pipe = Self::new(table);
        pipe.set_size(size);
        pipe
    }

    /// Set the logical size, acquiring new buffers only when growing past
    /// the physical size.
    pub fn set_size(&mut self, size: usize) {
        if size > self.refs.len() {
            let mut table = self.table.lock();
            self.refs.reserve(size - self.refs.len());
            while self.refs.len() < size {
                self.refs.push(table.acquire());
            }
        }
        self.used = size;
    }

    /// Logical size.
    #[inline]
    pub fn num_buffers(&self) -> usize {
        self.used
    }

    /// Physical size (buffers held, including ones beyond the logical size).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.refs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Table reference of the buffer at `index`.
    #[inline]
    pub fn buffer_ref(&self, index: usize) -> BufferRef {
        self.check_index(index);
        self.refs[index]
    }

    pub fn table(&self) -> &SharedBufferTable {
        &self.table
    }

    /// Buffer at `index`. Requires `index < num_buffers()`.
    ///
    /// The guard locks the whole shared table, so the pipe stays mutably
    /// borrowed until it is dropped. Use [`with_buffer_pair`](Self::with_buffer_pair)
    /// to work on two buffers at once, and drop the guard before touching
    /// any other pipe on the same table.
    pub fn read_buffer(&mut self, index: usize) -> MappedMutexGuard<'_, MidiBuffer> {
        self.write_buffer(index)
    }

    /// Mutable buffer at `index`. Requires `index < num_buffers()`.
    ///
    /// Same locking rule as [`read_buffer`](Self::read_buffer).
    pub fn write_buffer(&mut self, index: usize) -> MappedMutexGuard<'_, MidiBuffer> {
        let r = self.buffer_ref(index);
        MutexGuard::map(self.table.lock(), |table| table.buffer_mut(r))
    }

    /// Run `f` on two distinct buffers of this pipe under one table lock.
    ///
    /// Both indices must be below `num_buffers()`. Returns `None` when they
    /// name the same buffer.
    pub fn with_buffer_pair<R>(
        &mut self,
        first: usize,
        second: usize,
        f: impl FnOnce(&mut MidiBuffer, &mut MidiBuffer) -> R,
    ) -> Option<R> {
        let (a, b) = (self.buffer_ref(first), self.buffer_ref(second));
        let mut table = self.table.lock();
        let (a, b) = table.pair_mut(a, b)?;
        Some(f(a, b))
    }

    /// Clear every buffer within the logical size.
    pub fn clear(&mut self) {
        let mut table = self.table.lock();
        for &r in &self.refs[..self.used] {
            table.buffer_mut(r).clear();
        }
    }

    /// Resize to match `other`, then exchange contents pairwise.
    ///
    /// Ownership does not move: `other` keeps pointing at its own buffers,
    /// only the events trade places.
    pub fn swap_with(&mut self, other: &mut BufferPipe<'_>) {
        self.set_size(other.num_buffers());

        let mut table = self.table.lock();
        for (i, &r) in self.refs[..self.used].iter().enumerate() {
            table.buffer_mut(r).swap_with(other.write_buffer(i));
        }
    }

    /// Run `f` with a borrowed pipe over the logical buffers.
    ///
    /// The table stays locked for the duration of `f`.
    pub fn with_pipe<R>(&self, f: impl FnOnce(&mut BufferPipe<'_>) -> R) -> R {
        let mut table = self.table.lock();
        let refs = &self.refs[..self.used];
        let mut pipe = BufferPipe::project(table.buffers_mut(), refs.len(), |index| {
            refs.iter().position(|r| r.index() == index)
        });
        f(&mut pipe)
    }

    #[inline]
    fn check_index(&self, index: usize) {
        debug_assert!(
            index < self.used,
            "pipe index {} out of range (size {})",
            index,
            self.used
        );
        if index >= self.used {
            index_contract_breach(index, self.used);
        }
    }
}

impl Drop for ManagedBufferPipe {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        for r in self.refs.drain(..) {
            table.release(r);
        }
    }
}

impl std::fmt::Debug for ManagedBufferPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedBufferPipe")
            .field("used", &self.used)
            .field("capacity", &self.refs.len())
            .finish()
    }
}

/// Convenience for tests and hosts that want a private table.
impl Default for ManagedBufferPipe {
    fn default() -> Self {
        Self::new(BufferTable::shared(crate::config::DEFAULT_MIDI_EVENT_CAPACITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiMessage;
    use proptest::prelude::*;

    fn table() -> SharedBufferTable {
        BufferTable::shared(16)
    }

    #[test]
    fn test_grow_and_shrink() {
        let mut pipe = ManagedBufferPipe::new(table());
        pipe.set_size(4);
        assert_eq!(pipe.num_buffers(), 4);
        assert_eq!(pipe.capacity(), 4);

        pipe.set_size(2);
        assert_eq!(pipe.num_buffers(), 2);
        assert_eq!(pipe.capacity(), 4);
        assert_eq!(pipe.table().lock().live_count(), 4);

        pipe.set_size(0);
        assert!(pipe.is_empty());
        assert_eq!(pipe.capacity(), 4);
    }

    #[test]
    fn test_regrow_reuses_buffers() {
        let mut pipe = ManagedBufferPipe::new(table());
        pipe.set_size(3);
        let before: Vec<_> = (0..3).map(|i| pipe.buffer_ref(i)).collect();

        pipe.set_size(1);
        pipe.set_size(3);
        let after: Vec<_> = (0..3).map(|i| pipe.buffer_ref(i)).collect();
        assert_eq!(before, after);
        assert_eq!(pipe.table().lock().len(), 3);
    }

    #[test]
    fn test_drop_releases_refs() {
        let table = table();
        {
            let _pipe = ManagedBufferPipe::with_size(table.clone(), 5);
            assert_eq!(table.lock().live_count(), 5);
        }
        assert_eq!(table.lock().live_count(), 0);
    }

    #[test]
    fn test_swap_with_borrowed_pipe() {
        let mut managed = ManagedBufferPipe::new(table());
        let mut host = vec![MidiBuffer::with_capacity(16), MidiBuffer::with_capacity(16)];
        host[1].add_event(MidiMessage::note_on(0, 60, 100), 4);

        {
            let mut pipe = BufferPipe::from_slice(&mut host, 2);
            managed.swap_with(&mut pipe);
        }
        assert_eq!(managed.num_buffers(), 2);
        assert_eq!(managed.read_buffer(1).len(), 1);
        assert!(host[1].is_empty());

        managed.write_buffer(0)
            .add_event(MidiMessage::note_off(0, 60, 0), 8);
        {
            let mut pipe = BufferPipe::from_slice(&mut host, 2);
            managed.swap_with(&mut pipe);
        }
        assert_eq!(host[0].len(), 1);
        assert_eq!(host[1].len(), 1);
        assert!(managed.read_buffer(0).is_empty());
    }

    #[test]
    fn test_with_pipe_sees_logical_buffers() {
        let mut managed = ManagedBufferPipe::with_size(table(), 3);
        managed.write_buffer(2)
            .add_event(MidiMessage::note_on(0, 64, 100), 0);
        managed.set_size(2);

        let count = managed.with_pipe(|pipe| {
            pipe.write_buffer(0)
                .add_event(MidiMessage::note_on(0, 60, 100), 0);
            pipe.num_buffers()
        });
        assert_eq!(count, 2);
        assert_eq!(managed.read_buffer(0).len(), 1);
    }

    #[test]
    fn test_copy_between_buffers_of_one_pipe() {
        let mut managed = ManagedBufferPipe::with_size(table(), 2);
        managed.write_buffer(0)
            .add_event(MidiMessage::note_on(0, 60, 100), 3);

        let copied = managed.with_buffer_pair(0, 1, |src, dst| {
            for event in src.iter() {
                dst.add_event(event.message, event.frame);
            }
            dst.len()
        });
        assert_eq!(copied, Some(1));
        assert_eq!(managed.read_buffer(0).len(), 1);
        assert_eq!(managed.read_buffer(1).len(), 1);

        assert!(managed.with_buffer_pair(1, 1, |_, _| ()).is_none());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_buffer_pair_checks_both_indices() {
        let mut managed = ManagedBufferPipe::with_size(table(), 2);
        let _ = managed.with_buffer_pair(0, 2, |_, _| ());
    }

    #[test]
    fn test_clear() {
        let mut managed = ManagedBufferPipe::with_size(table(), 2);
        managed.write_buffer(1)
            .add_event(MidiMessage::note_on(0, 60, 100), 0);
        managed.clear();
        assert!(managed.read_buffer(1).is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_index_past_logical_size_traps() {
        let mut managed = ManagedBufferPipe::with_size(table(), 4);
        managed.set_size(2);
        let _ = managed.read_buffer(2);
    }

    proptest! {
        #[test]
        fn prop_set_size_exposes_n_buffers(n in 0usize..48) {
            let mut pipe = ManagedBufferPipe::new(table());
            pipe.set_size(n);
            prop_assert_eq!(pipe.num_buffers(), n);
            for i in 0..n {
                prop_assert!(pipe.read_buffer(i).is_empty());
            }
        }

        #[test]
        fn prop_set_size_is_idempotent(n in 0usize..48) {
            let mut pipe = ManagedBufferPipe::new(table());
            pipe.set_size(n);
            let refs: Vec<_> = (0..n).map(|i| pipe.buffer_ref(i)).collect();
            let slots = pipe.table().lock().len();

            pipe.set_size(n);
            prop_assert_eq!(pipe.capacity(), n);
            prop_assert_eq!(pipe.table().lock().len(), slots);
            let again: Vec<_> = (0..n).map(|i| pipe.buffer_ref(i)).collect();
            prop_assert_eq!(refs, again);
        }

        #[test]
        fn prop_physical_size_never_shrinks(sizes in proptest::collection::vec(0usize..32, 1..10)) {
            let mut pipe = ManagedBufferPipe::new(table());
            let mut high = 0;
            for n in sizes {
                pipe.set_size(n);
                high = high.max(n);
                prop_assert_eq!(pipe.num_buffers(), n);
                prop_assert_eq!(pipe.capacity(), high);
            }
        }
    }
}
