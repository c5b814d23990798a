//! Bounded FIFO of output events.

use heapless::Deque;
use pk_ir::NoteEvent;

/// Maximum queued events between drains.
pub const EVENT_CAPACITY: usize = 256;

/// A fixed-capacity queue of [`NoteEvent`]s.
///
/// The engine pushes, the owner of the synthesis back end drains. Storage is
/// inline, so pushing and draining never touch the heap. When the queue is
/// full the new event is dropped and counted.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Deque<NoteEvent, EVENT_CAPACITY>,
    dropped: usize,
}

impl EventQueue {
    /// Create a new empty event queue.
    pub fn new() -> Self {
        Self {
            events: Deque::new(),
            dropped: 0,
        }
    }

    /// Append an event. Returns false if it was dropped.
    pub fn push(&mut self, event: NoteEvent) -> bool {
        match self.events.push_back(event) {
            Ok(()) => true,
            Err(event) => {
                self.dropped += 1;
                log::warn!("event queue full, dropping {:?}", event);
                false
            }
        }
    }

    /// Pop the oldest event.
    pub fn pop(&mut self) -> Option<NoteEvent> {
        self.events.pop_front()
    }

    /// Pop every queued event, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = NoteEvent> + '_ {
        core::iter::from_fn(move || self.events.pop_front())
    }

    /// Iterate without consuming.
    pub fn iter(&self) -> impl Iterator<Item = &NoteEvent> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Events dropped on overflow since creation.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
