//! Real-time note engine for polykey.
//!
//! A cooperative [`Scheduler`] drives the [`Keyboard`] key scan and its
//! [`Timer`]-based generators ([`Arpeggiator`], [`Sequencer`]). The keyboard
//! allocates voices from a bounded [`VoicePool`] and reports voice, key and
//! step events through an [`EventQueue`] drained by the owner.
//!
//! After construction the tick path does not allocate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod arpeggiator;
mod clock;
mod event_queue;
mod key;
mod keyboard;
pub mod scheduler;
mod sequencer;
mod step_clock;
mod timer;
mod voice_pool;

pub use arpeggiator::{Arpeggiator, MAX_ARP_INPUT, MAX_ARP_NOTES};
#[cfg(feature = "std")]
pub use clock::SystemClock;
pub use clock::{Clock, ManualClock};
pub use event_queue::{EventQueue, EVENT_CAPACITY};
pub use key::{DebouncedKey, KeyHandle, KeySource, KeyState, ScriptedKey};
pub use keyboard::{Generator, HeldNotes, Keyboard};
pub use scheduler::{Scheduler, StopHandle, Task, TaskKey, MIN_TICK};
pub use sequencer::Sequencer;
pub use step_clock::StepClock;
pub use timer::{StepProducer, Timer, TimerListener};
pub use voice_pool::{voice_holds, Voice, VoicePool};
