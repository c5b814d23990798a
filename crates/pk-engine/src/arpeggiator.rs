//! Arpeggiator: turns a held chord into a stream of single notes.

use heapless::Vec;
use pk_ir::{ArpMode, Note, StepNotes, MAX_NOTES, MAX_OCTAVES};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::timer::StepProducer;

/// Held notes an arpeggiator accepts (live plus sustained).
pub const MAX_ARP_INPUT: usize = MAX_NOTES * 2;

/// Working sequence capacity after octave stacking and palindromes.
pub const MAX_ARP_NOTES: usize = 256;

const DEFAULT_SEED: u64 = 0x5eed_a4be_99a7_0001;

/// Orders held notes and plays one per step.
#[derive(Debug, Clone)]
pub struct Arpeggiator {
    mode: ArpMode,
    octaves: i32,
    probability: f32,
    /// Input notes as received, in insertion order
    raw_notes: Vec<Note, MAX_ARP_INPUT>,
    /// Expanded and ordered working sequence
    notes: Vec<Note, MAX_ARP_NOTES>,
    /// Index of the last played note; None before the first step
    position: Option<usize>,
    rng: SmallRng,
}

impl Arpeggiator {
    pub fn new(mode: ArpMode, octaves: i32, probability: f32) -> Self {
        let mut arp = Self {
            mode,
            octaves: 0,
            probability: 1.0,
            raw_notes: Vec::new(),
            notes: Vec::new(),
            position: None,
            rng: SmallRng::seed_from_u64(DEFAULT_SEED),
        };
        arp.set_octaves(octaves);
        arp.set_probability(probability);
        arp
    }

    /// Reseed the random source used for probability and random mode.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn mode(&self) -> ArpMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ArpMode) {
        if mode != self.mode {
            log::debug!("arp mode {}", mode.name());
            self.mode = mode;
            self.rebuild();
        }
    }

    pub fn octaves(&self) -> i32 {
        self.octaves
    }

    /// Set octave stacking, clamped to +-MAX_OCTAVES.
    pub fn set_octaves(&mut self, octaves: i32) {
        let octaves = octaves.clamp(-MAX_OCTAVES, MAX_OCTAVES);
        if octaves != self.octaves {
            self.octaves = octaves;
            self.rebuild();
        }
    }

    pub fn probability(&self) -> f32 {
        self.probability
    }

    pub fn set_probability(&mut self, probability: f32) {
        self.probability = pk_ir::clamp_velocity(probability);
    }

    /// Replace the held set. Returns true when it goes from empty to
    /// non-empty; the sequence then restarts from its first note.
    pub fn update_notes(&mut self, notes: &[Note]) -> bool {
        let was_empty = self.notes.is_empty();
        self.raw_notes.clear();
        for note in notes {
            if self.raw_notes.push(*note).is_err() {
                log::warn!("arpeggiator input full, ignoring {}", note.notenum);
                break;
            }
        }
        self.rebuild();

        let started = was_empty && !self.notes.is_empty();
        if started {
            self.position = None;
        }
        started
    }

    fn rebuild(&mut self) {
        self.notes.clear();
        for note in &self.raw_notes {
            let _ = self.notes.push(*note);
        }
        self.stack_octaves();

        match self.mode {
            ArpMode::Up => self.notes.sort_unstable_by(|a, b| a.cmp_pitch(b)),
            ArpMode::Down => self.notes.sort_unstable_by(|a, b| b.cmp_pitch(a)),
            ArpMode::UpDown => {
                self.notes.sort_unstable_by(|a, b| a.cmp_pitch(b));
                self.mirror();
            }
            ArpMode::DownUp => {
                self.notes.sort_unstable_by(|a, b| b.cmp_pitch(a));
                self.mirror();
            }
            ArpMode::Played | ArpMode::Random => {}
        }
    }

    /// Append every raw note shifted by 12 semitones per octave step.
    fn stack_octaves(&mut self) {
        let direction = self.octaves.signum() * 12;
        for step in 1..=self.octaves.abs() {
            for note in &self.raw_notes {
                if self.notes.push(note.transposed(direction * step)).is_err() {
                    log::warn!("arpeggiator sequence full, truncating octaves");
                    return;
                }
            }
        }
    }

    /// Append the reversed interior so the sweep turns without repeating
    /// its end notes.
    fn mirror(&mut self) {
        let len = self.notes.len();
        if len <= 2 {
            return;
        }
        for i in (1..len - 1).rev() {
            let note = self.notes[i];
            if self.notes.push(note).is_err() {
                log::warn!("arpeggiator sequence full, truncating sweep");
                return;
            }
        }
    }

    /// The unexpanded input.
    pub fn raw_notes(&self) -> &[Note] {
        &self.raw_notes
    }

    /// The working sequence.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    fn skip_step(&mut self) -> bool {
        self.probability < 1.0
            && (self.probability <= 0.0 || self.rng.gen::<f32>() > self.probability)
    }
}

impl Default for Arpeggiator {
    fn default() -> Self {
        Self::new(ArpMode::Up, 0, 1.0)
    }
}

impl StepProducer for Arpeggiator {
    fn on_step(&mut self) -> Option<StepNotes> {
        if self.notes.is_empty() || self.skip_step() {
            return None;
        }
        let len = self.notes.len();
        let index = match self.mode {
            ArpMode::Random => self.rng.gen_range(0..len),
            _ => self.position.map_or(0, |p| (p + 1) % len),
        };
        self.position = Some(index);

        let note = self.notes[index];
        log::trace!("arp step {} -> {}", index, note.notenum);
        let mut out = StepNotes::new();
        out.push(note);
        Some(out)
    }

    fn position(&self) -> Option<usize> {
        self.position
    }

    fn hold(&mut self, notes: &[Note]) -> bool {
        self.update_notes(notes)
    }

    fn on_enable(&mut self) {
        self.position = None;
    }
}
