//! Step timer: drives a [`StepProducer`] from a [`StepClock`].
//!
//! The timer owns the step phase and the set of notes it has pressed but not
//! yet released. On each scheduler tick it:
//!
//! 1. Releases the open notes once the gate has elapsed, or when a new step
//!    boundary has been reached.
//! 2. On a step boundary, advances the phase by exactly one step (never by
//!    wall-clock delta), asks the producer for the step's notes, presses them
//!    and reports the step.
//!
//! Presses and releases go to a [`TimerListener`] passed into each call, so
//! the timer holds no reference to whoever consumes them.

use core::time::Duration;
use heapless::Vec;
use pk_ir::{Instant, Note, NoteNum, StepDivision, StepNotes, MAX_STEP_NOTES};

use crate::step_clock::StepClock;

/// Produces the notes for each step of a timed generator.
pub trait StepProducer {
    /// Called on every step boundary. `None` (or an empty list) means a rest.
    fn on_step(&mut self) -> Option<StepNotes>;

    /// Position reported with the step notification.
    fn position(&self) -> Option<usize> {
        None
    }

    /// Offer the currently held notes. Returns true if the phase should
    /// restart, so the next tick fires a step immediately.
    fn hold(&mut self, _notes: &[Note]) -> bool {
        false
    }

    /// The timer was enabled.
    fn on_enable(&mut self) {}

    /// The timer was disabled, after its open notes were released.
    fn on_disable(&mut self) {}
}

/// Receives the timer's output.
pub trait TimerListener {
    fn press(&mut self, note: &Note);
    fn release(&mut self, notenum: NoteNum);
    fn step(&mut self, _position: Option<usize>) {}
}

/// A step clock bound to a producer.
#[derive(Debug)]
pub struct Timer<P> {
    clock: StepClock,
    enabled: bool,
    /// Restart the phase on the next update
    restart: bool,
    /// Start of the current step
    anchor: Instant,
    /// Notes pressed by this timer and not yet released
    last_press: Vec<NoteNum, MAX_STEP_NOTES>,
    producer: P,
}

impl<P: StepProducer> Timer<P> {
    /// Create a disabled timer.
    pub fn new(producer: P, clock: StepClock) -> Self {
        Self {
            clock,
            enabled: false,
            restart: false,
            anchor: Instant::ZERO,
            last_press: Vec::new(),
            producer,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start stepping. The first step fires on the next update.
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        log::debug!("timer enabled");
        self.enabled = true;
        self.restart = true;
        self.producer.on_enable();
    }

    /// Stop stepping and release every open note. A no-op when already
    /// disabled.
    pub fn disable(&mut self, listener: &mut impl TimerListener) {
        if !self.enabled {
            return;
        }
        log::debug!("timer disabled");
        self.enabled = false;
        self.restart = false;
        self.release_open(listener);
        self.producer.on_disable();
    }

    pub fn toggle(&mut self, listener: &mut impl TimerListener) {
        if self.enabled {
            self.disable(listener);
        } else {
            self.enable();
        }
    }

    /// Restart the phase: the next update fires a step immediately.
    pub fn rearm(&mut self) {
        if self.enabled {
            self.restart = true;
        }
    }

    /// Forward held notes to the producer, re-arming if it asks.
    pub fn hold(&mut self, notes: &[Note]) {
        if self.producer.hold(notes) {
            self.rearm();
        }
    }

    /// Advance the timer to `now`.
    pub fn update(&mut self, now: Instant, listener: &mut impl TimerListener) {
        if !self.enabled {
            return;
        }
        let step_time = self.clock.step_time();
        let boundary = self.restart || now >= self.anchor + step_time;
        if boundary || now - self.anchor >= self.clock.gate_duration() {
            self.release_open(listener);
        }

        if boundary {
            if self.restart {
                self.restart = false;
                self.anchor = now;
            } else {
                self.anchor += step_time;
            }
            if let Some(notes) = self.producer.on_step() {
                for note in &notes {
                    self.press(note, listener);
                }
            }
            let position = self.producer.position();
            log::trace!("step {:?}", position);
            listener.step(position);
        }
    }

    fn press(&mut self, note: &Note, listener: &mut impl TimerListener) {
        if self.last_press.push(note.notenum).is_err() {
            log::warn!("timer has too many open notes, skipping {}", note.notenum);
            return;
        }
        listener.press(note);
    }

    fn release_open(&mut self, listener: &mut impl TimerListener) {
        for &notenum in &self.last_press {
            listener.release(notenum);
        }
        self.last_press.clear();
    }

    /// Notes pressed and not yet released.
    pub fn open_notes(&self) -> &[NoteNum] {
        &self.last_press
    }

    pub fn clock(&self) -> &StepClock {
        &self.clock
    }

    /// Tempo changes keep the current phase.
    pub fn set_bpm(&mut self, bpm: f32) {
        self.clock.set_bpm(bpm);
    }

    pub fn set_steps(&mut self, steps: f32) {
        self.clock.set_steps(steps);
    }

    pub fn set_division(&mut self, division: StepDivision) {
        self.clock.set_division(division);
    }

    pub fn set_gate(&mut self, gate: f32) {
        self.clock.set_gate(gate);
    }

    pub fn step_time(&self) -> Duration {
        self.clock.step_time()
    }

    pub fn gate_duration(&self) -> Duration {
        self.clock.gate_duration()
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn producer_mut(&mut self) -> &mut P {
        &mut self.producer
    }
}
