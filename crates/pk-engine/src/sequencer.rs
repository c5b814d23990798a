//! Step sequencer: plays one grid column per step.

use pk_ir::{Cell, Note, NoteNum, Pattern, StepNotes};

use crate::timer::StepProducer;

/// A multi-track step sequencer over a [`Pattern`].
///
/// Each step advances the column and presses every audible cell in it, one
/// note per track. Mapping tracks to voices is left to the listener.
#[derive(Clone, Debug, Default)]
pub struct Sequencer {
    pattern: Pattern,
    /// Last played column; None before the first step
    position: Option<usize>,
}

impl Sequencer {
    pub fn new(length: usize, tracks: usize) -> Self {
        Self {
            pattern: Pattern::new(length, tracks),
            position: None,
        }
    }

    pub fn from_pattern(pattern: Pattern) -> Self {
        Self {
            pattern,
            position: None,
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn length(&self) -> usize {
        self.pattern.length()
    }

    /// Resize, keeping existing cells.
    pub fn set_length(&mut self, length: usize) {
        self.pattern.resize(length, self.pattern.tracks());
        self.clamp_position();
    }

    pub fn tracks(&self) -> usize {
        self.pattern.tracks()
    }

    pub fn set_tracks(&mut self, tracks: usize) {
        self.pattern.resize(self.pattern.length(), tracks);
    }

    fn clamp_position(&mut self) {
        let last = self.pattern.length() - 1;
        self.position = self.position.map(|p| p.min(last));
    }

    /// Place a note. Position and track are clamped into range.
    pub fn set_note(&mut self, position: usize, track: usize, notenum: NoteNum, velocity: f32) {
        self.pattern
            .set_cell(position, track, Some(Cell::new(notenum, velocity)));
    }

    pub fn note(&self, position: usize, track: usize) -> Option<&Cell> {
        self.pattern.cell(position, track)
    }

    pub fn has_note(&self, position: usize, track: usize) -> bool {
        self.note(position, track).is_some()
    }

    pub fn remove_note(&mut self, position: usize, track: usize) {
        self.pattern.set_cell(position, track, None);
    }

    /// All cells of a track.
    pub fn track(&self, track: usize) -> &[Option<Cell>] {
        self.pattern.track(track)
    }

    pub fn clear(&mut self) {
        self.pattern.clear();
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Restart from the first column on the next step.
    pub fn rewind(&mut self) {
        self.position = None;
    }
}

impl StepProducer for Sequencer {
    fn on_step(&mut self) -> Option<StepNotes> {
        let pos = self.position.map_or(0, |p| (p + 1) % self.pattern.length());
        self.position = Some(pos);

        let mut out = StepNotes::new();
        for cell in self.pattern.column(pos).flatten().filter(|c| c.is_audible()) {
            if out.try_push(Note::new(cell.notenum, cell.velocity)).is_err() {
                break;
            }
        }
        Some(out)
    }

    fn position(&self) -> Option<usize> {
        self.position
    }

    fn on_enable(&mut self) {
        self.rewind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn step_pitches(seq: &mut Sequencer) -> Vec<NoteNum> {
        seq.on_step()
            .map(|notes| notes.iter().map(|n| n.notenum).collect())
            .unwrap_or_default()
    }

    #[test]
    fn steps_through_columns() {
        let mut seq = Sequencer::new(4, 2);
        seq.set_note(0, 0, 36, 1.0);
        seq.set_note(0, 1, 42, 0.8);
        seq.set_note(2, 1, 38, 1.0);

        assert_eq!(step_pitches(&mut seq), [36, 42]);
        assert_eq!(seq.position(), Some(0));
        assert!(step_pitches(&mut seq).is_empty());
        assert_eq!(step_pitches(&mut seq), [38]);
        assert!(step_pitches(&mut seq).is_empty());
        assert_eq!(seq.position(), Some(3));
        assert_eq!(step_pitches(&mut seq), [36, 42], "wraps to the first column");
    }

    #[test]
    fn silent_cells_do_not_fire() {
        let mut seq = Sequencer::new(2, 2);
        seq.set_note(0, 0, 36, 0.0);
        seq.set_note(0, 1, 0, 1.0);
        assert!(seq.has_note(0, 0));
        assert!(step_pitches(&mut seq).is_empty());
    }

    #[test]
    fn edit_and_clear() {
        let mut seq = Sequencer::new(8, 1);
        seq.set_note(3, 0, 40, 1.0);
        assert_eq!(seq.note(3, 0).map(|c| c.notenum), Some(40));
        assert_eq!(seq.track(0).iter().flatten().count(), 1);

        seq.remove_note(3, 0);
        assert!(!seq.has_note(3, 0));

        seq.set_note(99, 99, 41, 1.0);
        assert!(seq.has_note(7, 0), "coordinates clamp to the last cell");
        seq.clear();
        assert_eq!(seq.pattern().count(), 0);
    }

    #[test]
    fn shrinking_clamps_position() {
        let mut seq = Sequencer::new(8, 1);
        for _ in 0..6 {
            seq.on_step();
        }
        assert_eq!(seq.position(), Some(5));
        seq.set_length(4);
        assert_eq!(seq.position(), Some(3));
        seq.on_step();
        assert_eq!(seq.position(), Some(0));
    }

    #[test]
    fn enable_rewinds() {
        let mut seq = Sequencer::new(4, 1);
        seq.on_step();
        seq.on_step();
        seq.on_enable();
        assert_eq!(seq.position(), None);
        seq.on_step();
        assert_eq!(seq.position(), Some(0));
    }
}
