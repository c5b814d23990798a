//! Note value type.

use arrayvec::ArrayVec;

/// Pitch number. Conventionally 0-127 (MIDI), but octave stacking may
/// push values outside that range, so it is kept signed and unbounded.
pub type NoteNum = i32;

/// Maximum notes a single step may produce (one per sequencer track).
pub const MAX_STEP_NOTES: usize = 16;

/// Notes produced by one step of a timed generator.
pub type StepNotes = ArrayVec<Note, MAX_STEP_NOTES>;

/// A pressed note.
///
/// Two notes with the same `notenum` are the same note for membership
/// purposes, even when velocity or timestamp differ. Use [`Note::same_pitch`]
/// for that comparison; the derived `PartialEq` compares every field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    /// Pitch number
    pub notenum: NoteNum,
    /// Velocity (0.0-1.0)
    pub velocity: f32,
    /// Index of the physical key that produced this note, if any
    pub keynum: Option<usize>,
    /// Monotonic creation stamp, used for last-note priority
    pub timestamp: u64,
}

impl Note {
    /// Create a note from an external source (no physical key).
    pub fn new(notenum: NoteNum, velocity: f32) -> Self {
        Self {
            notenum,
            velocity: clamp_velocity(velocity),
            keynum: None,
            timestamp: 0,
        }
    }

    /// Attach the originating physical key index.
    pub fn with_key(mut self, keynum: Option<usize>) -> Self {
        self.keynum = keynum;
        self
    }

    /// Attach a creation stamp.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// True if both notes share a pitch.
    pub fn same_pitch(&self, other: &Note) -> bool {
        self.notenum == other.notenum
    }

    /// True if this note has the given pitch.
    pub fn is_pitch(&self, notenum: NoteNum) -> bool {
        self.notenum == notenum
    }

    /// Copy of this note shifted by `semitones`.
    pub fn transposed(&self, semitones: NoteNum) -> Self {
        Self {
            notenum: self.notenum + semitones,
            ..*self
        }
    }

    /// Pitch ordering (ascending notenum).
    pub fn cmp_pitch(&self, other: &Note) -> core::cmp::Ordering {
        self.notenum.cmp(&other.notenum)
    }
}

/// Clamp a velocity into 0.0-1.0. NaN maps to silence.
pub fn clamp_velocity(velocity: f32) -> f32 {
    if velocity.is_nan() {
        0.0
    } else {
        velocity.clamp(0.0, 1.0)
    }
}

/// True if any note in `notes` has the given pitch.
pub fn contains_pitch(notes: &[Note], notenum: NoteNum) -> bool {
    notes.iter().any(|n| n.is_pitch(notenum))
}
