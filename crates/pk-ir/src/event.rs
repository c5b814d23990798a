//! Output events produced by the note engine.

use crate::note::{Note, NoteNum};

/// Something the instrument tells the outside world.
///
/// Voice events drive the synthesis back end; key events and step
/// notifications drive indicators.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoteEvent {
    // === Voice events ===
    /// A voice started sounding `note`
    VoicePress { voice: usize, note: Note },
    /// A voice stopped sounding `note`
    VoiceRelease { voice: usize, note: Note },

    // === Physical key events ===
    /// A physical key was pressed
    KeyPress { keynum: usize, note: Note },
    /// A physical key was released
    KeyRelease { keynum: usize, notenum: NoteNum },

    // === Generator events ===
    /// A timed generator reached a step boundary
    Step { position: Option<usize> },
}

impl NoteEvent {
    /// Voice index, if this is a voice event.
    pub fn voice(&self) -> Option<usize> {
        match self {
            NoteEvent::VoicePress { voice, .. } | NoteEvent::VoiceRelease { voice, .. } => {
                Some(*voice)
            }
            _ => None,
        }
    }

    /// Pitch carried by the event, if any.
    pub fn notenum(&self) -> Option<NoteNum> {
        match self {
            NoteEvent::VoicePress { note, .. }
            | NoteEvent::VoiceRelease { note, .. }
            | NoteEvent::KeyPress { note, .. } => Some(note.notenum),
            NoteEvent::KeyRelease { notenum, .. } => Some(*notenum),
            NoteEvent::Step { .. } => None,
        }
    }

    pub fn is_voice_press(&self) -> bool {
        matches!(self, NoteEvent::VoicePress { .. })
    }

    pub fn is_voice_release(&self) -> bool {
        matches!(self, NoteEvent::VoiceRelease { .. })
    }
}
