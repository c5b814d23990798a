//! Instrument construction parameters.

use crate::modes::{ArpMode, PriorityMode};
use crate::note::NoteNum;
use crate::pattern::{MAX_LENGTH, MAX_TRACKS};
use crate::step::StepDivision;

/// Upper bound on the voice pool.
pub const MAX_VOICES: usize = 64;

/// Scheduler frequency bounds (Hz).
pub const MIN_TASK_HZ: u32 = 1;
pub const MAX_TASK_HZ: u32 = 1000;

/// Tempo bounds (beats per minute).
pub const MIN_BPM: f32 = 1.0;
pub const MAX_BPM: f32 = 999.0;

/// Octave stacking bound, in either direction.
pub const MAX_OCTAVES: i32 = 4;

/// Everything needed to assemble an instrument.
///
/// Values may come from an untrusted file; call [`InstrumentConfig::sanitized`]
/// before use. Out-of-range values are clamped, never rejected.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InstrumentConfig {
    /// Pitch of physical key 0
    pub root_note: NoteNum,
    /// Voice selection policy
    pub priority_mode: PriorityMode,
    /// Voice pool size (1..=MAX_VOICES)
    pub max_voices: usize,
    /// Tempo shared by arpeggiator and sequencer
    pub bpm: f32,
    /// Beat subdivision per step
    pub step_division: StepDivision,
    /// Fraction of a step a note is held (0.0-1.0)
    pub gate: f32,
    pub arp_mode: ArpMode,
    /// Signed octave stacking count
    pub octaves: i32,
    /// Per-step trigger chance (0.0-1.0)
    pub probability: f32,
    /// Start with the arpeggiator engaged
    pub arp_enabled: bool,
    pub sequencer_length: usize,
    pub sequencer_tracks: usize,
    /// MIDI input channel, 1-16, or 0 for omni
    pub midi_channel: u8,
    /// Keyboard scan rate
    pub keyboard_hz: u32,
    /// Generator timer rate
    pub timer_hz: u32,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            root_note: 48,
            priority_mode: PriorityMode::High,
            max_voices: 4,
            bpm: 120.0,
            step_division: StepDivision::Eighth,
            gate: 0.5,
            arp_mode: ArpMode::Up,
            octaves: 0,
            probability: 1.0,
            arp_enabled: false,
            sequencer_length: 16,
            sequencer_tracks: 1,
            midi_channel: 0,
            keyboard_hz: 100,
            timer_hz: 1000,
        }
    }
}

impl InstrumentConfig {
    /// Copy with every field clamped into its valid range.
    pub fn sanitized(&self) -> Self {
        Self {
            root_note: self.root_note,
            priority_mode: self.priority_mode,
            max_voices: self.max_voices.clamp(1, MAX_VOICES),
            bpm: clamp_f32(self.bpm, MIN_BPM, MAX_BPM, 120.0),
            step_division: self.step_division,
            gate: clamp_f32(self.gate, 0.0, 1.0, 0.5),
            arp_mode: self.arp_mode,
            octaves: self.octaves.clamp(-MAX_OCTAVES, MAX_OCTAVES),
            probability: clamp_f32(self.probability, 0.0, 1.0, 1.0),
            arp_enabled: self.arp_enabled,
            sequencer_length: self.sequencer_length.clamp(1, MAX_LENGTH),
            sequencer_tracks: self.sequencer_tracks.clamp(1, MAX_TRACKS),
            midi_channel: self.midi_channel.min(16),
            keyboard_hz: self.keyboard_hz.clamp(MIN_TASK_HZ, MAX_TASK_HZ),
            timer_hz: self.timer_hz.clamp(MIN_TASK_HZ, MAX_TASK_HZ),
        }
    }

    /// True if [`sanitized`](Self::sanitized) would change nothing.
    pub fn is_valid(&self) -> bool {
        *self == self.sanitized()
    }
}

fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}
