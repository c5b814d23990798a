//! Synthesis back end trait and error types.

use pk_ir::{Note, NoteEvent, NoteNum};
use thiserror::Error;

/// Error type for back end operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The command queue has no room
    #[error("command queue full")]
    QueueFull,
    /// The consumer side has gone away
    #[error("back end disconnected")]
    Disconnected,
}

/// Receives voice commands from the instrument.
///
/// Calls are fire-and-forget and must not block. Only the voice methods are
/// required; indicator callbacks default to doing nothing.
pub trait SynthBackend {
    /// Start `note` on `voice`.
    fn voice_press(&mut self, voice: usize, note: &Note) -> Result<(), BackendError>;

    /// Stop `note` on `voice`.
    fn voice_release(&mut self, voice: usize, note: &Note) -> Result<(), BackendError>;

    /// A physical key went down.
    fn key_press(&mut self, _keynum: usize, _note: &Note) -> Result<(), BackendError> {
        Ok(())
    }

    /// A physical key came up.
    fn key_release(&mut self, _keynum: usize, _notenum: NoteNum) -> Result<(), BackendError> {
        Ok(())
    }

    /// A generator reached a step boundary.
    fn step(&mut self, _position: Option<usize>) -> Result<(), BackendError> {
        Ok(())
    }

    /// Dispatch one engine event to the matching method.
    fn handle(&mut self, event: &NoteEvent) -> Result<(), BackendError> {
        match event {
            NoteEvent::VoicePress { voice, note } => self.voice_press(*voice, note),
            NoteEvent::VoiceRelease { voice, note } => self.voice_release(*voice, note),
            NoteEvent::KeyPress { keynum, note } => self.key_press(*keynum, note),
            NoteEvent::KeyRelease { keynum, notenum } => self.key_release(*keynum, *notenum),
            NoteEvent::Step { position } => self.step(*position),
        }
    }
}
