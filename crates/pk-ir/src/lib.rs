//! Core data types for the polykey note engine.
//!
//! Notes, modes, timing, the sequencer grid, output events and the
//! instrument configuration. Everything here is plain data shared by the
//! engine, the output back ends and the controller.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod config;
mod event;
mod modes;
mod note;
mod pattern;
mod step;
mod time;

pub use config::{
    InstrumentConfig, MAX_BPM, MAX_OCTAVES, MAX_TASK_HZ, MAX_VOICES, MIN_BPM, MIN_TASK_HZ,
};
pub use event::NoteEvent;
pub use modes::{ArpMode, PriorityMode};
pub use note::{clamp_velocity, contains_pitch, Note, NoteNum, StepNotes, MAX_STEP_NOTES};
pub use pattern::{Cell, Pattern, MAX_LENGTH, MAX_TRACKS};
pub use step::{StepDivision, MIN_STEPS_PER_BEAT};
pub use time::Instant;

/// Upper bound on live (and sustained) notes held by a keyboard.
pub const MAX_NOTES: usize = 32;
