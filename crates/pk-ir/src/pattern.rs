//! Step sequencer grid.

use alloc::vec::Vec;

use crate::note::NoteNum;

/// Upper bound on sequencer tracks.
pub const MAX_TRACKS: usize = 16;

/// Upper bound on steps per track.
pub const MAX_LENGTH: usize = 256;

/// A populated grid cell.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    /// Pitch to press
    pub notenum: NoteNum,
    /// Velocity (0.0-1.0)
    pub velocity: f32,
}

impl Cell {
    pub fn new(notenum: NoteNum, velocity: f32) -> Self {
        Self {
            notenum,
            velocity: crate::note::clamp_velocity(velocity),
        }
    }

    /// True if this cell produces a press when reached.
    ///
    /// Pitch 0 and zero velocity both mark a silent cell.
    pub fn is_audible(&self) -> bool {
        self.notenum > 0 && self.velocity > 0.0
    }
}

/// A `tracks x length` grid of optional cells.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pattern {
    length: usize,
    tracks: usize,
    /// Grid data, stored track-major: data[track * length + step]
    data: Vec<Option<Cell>>,
}

impl Pattern {
    /// Create an empty pattern. Dimensions are clamped to 1..=MAX.
    pub fn new(length: usize, tracks: usize) -> Self {
        let length = length.clamp(1, MAX_LENGTH);
        let tracks = tracks.clamp(1, MAX_TRACKS);
        Self {
            length,
            tracks,
            data: alloc::vec![None; length * tracks],
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn tracks(&self) -> usize {
        self.tracks
    }

    fn index(&self, step: usize, track: usize) -> usize {
        let step = step.min(self.length - 1);
        let track = track.min(self.tracks - 1);
        track * self.length + step
    }

    /// Cell at (`step`, `track`). Out-of-range coordinates are clamped.
    pub fn cell(&self, step: usize, track: usize) -> Option<&Cell> {
        self.data[self.index(step, track)].as_ref()
    }

    /// Overwrite a cell. Out-of-range coordinates are clamped.
    pub fn set_cell(&mut self, step: usize, track: usize, cell: Option<Cell>) {
        let i = self.index(step, track);
        self.data[i] = cell;
    }

    /// All cells of one track, in step order.
    pub fn track(&self, track: usize) -> &[Option<Cell>] {
        let start = self.index(0, track);
        &self.data[start..start + self.length]
    }

    /// Cells in column `step`, one per track.
    pub fn column(&self, step: usize) -> impl Iterator<Item = Option<&Cell>> + '_ {
        let step = step.min(self.length - 1);
        (0..self.tracks).map(move |t| self.data[t * self.length + step].as_ref())
    }

    /// Empty every cell, keeping dimensions.
    pub fn clear(&mut self) {
        self.data.iter_mut().for_each(|c| *c = None);
    }

    /// Change dimensions, keeping overlapping cells. New cells start empty.
    pub fn resize(&mut self, length: usize, tracks: usize) {
        let length = length.clamp(1, MAX_LENGTH);
        let tracks = tracks.clamp(1, MAX_TRACKS);
        if length == self.length && tracks == self.tracks {
            return;
        }
        let mut data = alloc::vec![None; length * tracks];
        for t in 0..tracks.min(self.tracks) {
            for s in 0..length.min(self.length) {
                data[t * length + s] = self.data[t * self.length + s];
            }
        }
        self.length = length;
        self.tracks = tracks;
        self.data = data;
    }

    /// Number of populated cells.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|c| c.is_some()).count()
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new(16, 1)
    }
}
