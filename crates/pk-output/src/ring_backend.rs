//! Lock-free hand-off of voice commands to another thread.
//!
//! The engine thread owns a [`RingBackend`] and pushes [`VoiceCommand`]s; the
//! synthesis thread owns the paired [`RingReceiver`] and pops them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pk_ir::{Note, NoteNum};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::traits::{BackendError, SynthBackend};

/// A command for the synthesis engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VoiceCommand {
    Press {
        voice: usize,
        notenum: NoteNum,
        velocity: f32,
    },
    Release {
        voice: usize,
        notenum: NoteNum,
    },
}

/// Producer side.
pub struct RingBackend {
    producer: HeapProd<VoiceCommand>,
    connected: Arc<AtomicBool>,
}

/// Consumer side.
pub struct RingReceiver {
    consumer: HeapCons<VoiceCommand>,
    connected: Arc<AtomicBool>,
}

impl RingBackend {
    /// Create a connected pair holding up to `capacity` commands.
    pub fn new(capacity: usize) -> (Self, RingReceiver) {
        let rb = HeapRb::<VoiceCommand>::new(capacity.max(1));
        let (producer, consumer) = rb.split();
        let connected = Arc::new(AtomicBool::new(true));
        (
            Self {
                producer,
                connected: connected.clone(),
            },
            RingReceiver {
                consumer,
                connected,
            },
        )
    }

    fn send(&mut self, command: VoiceCommand) -> Result<(), BackendError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(BackendError::Disconnected);
        }
        self.producer
            .try_push(command)
            .map_err(|_| BackendError::QueueFull)
    }
}

impl SynthBackend for RingBackend {
    fn voice_press(&mut self, voice: usize, note: &Note) -> Result<(), BackendError> {
        self.send(VoiceCommand::Press {
            voice,
            notenum: note.notenum,
            velocity: note.velocity,
        })
    }

    fn voice_release(&mut self, voice: usize, note: &Note) -> Result<(), BackendError> {
        self.send(VoiceCommand::Release {
            voice,
            notenum: note.notenum,
        })
    }
}

impl Drop for RingBackend {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl RingReceiver {
    /// Pop the next command, if any.
    pub fn try_recv(&mut self) -> Option<VoiceCommand> {
        self.consumer.try_pop()
    }

    /// Pop every queued command.
    pub fn drain(&mut self) -> impl Iterator<Item = VoiceCommand> + '_ {
        self.consumer.pop_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// False once the producer has been dropped.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Drop for RingReceiver {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::Release);
    }
}
