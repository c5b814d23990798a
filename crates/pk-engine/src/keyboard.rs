//! Keyboard: note buffers, sustain, priority and voice allocation.
//!
//! Notes arrive from physical keys, MIDI or scripts via [`Keyboard::append`]
//! and [`Keyboard::remove`]. After every change the keyboard re-evaluates:
//!
//! - With no generator running, the held set is sorted by the priority mode,
//!   truncated to the pool size and reconciled against the voice pool.
//! - With an arpeggiator or sequencer running, the held set is handed to the
//!   generator instead, and the voice pool follows the generator's timed
//!   presses and releases.
//!
//! Voices are only ever released by reconciliation or by the generator, so
//! lifting a key under sustain keeps its voice sounding.

use alloc::boxed::Box;
use alloc::vec::Vec as AllocVec;
use heapless::Vec;
use pk_ir::{Instant, Note, NoteEvent, NoteNum, PriorityMode, MAX_NOTES};

use crate::arpeggiator::{Arpeggiator, MAX_ARP_INPUT};
use crate::event_queue::EventQueue;
use crate::key::{KeySource, KeyState};
use crate::sequencer::Sequencer;
use crate::step_clock::StepClock;
use crate::timer::{StepProducer, Timer, TimerListener};
use crate::voice_pool::VoicePool;

/// Held notes, live plus sustained, without duplicate pitches.
pub type HeldNotes = Vec<Note, MAX_ARP_INPUT>;

/// A timed note generator the keyboard can hand its notes to.
#[derive(Debug)]
pub enum Generator {
    Arpeggiator(Arpeggiator),
    Sequencer(Sequencer),
}

impl Generator {
    pub fn as_arpeggiator(&self) -> Option<&Arpeggiator> {
        match self {
            Generator::Arpeggiator(arp) => Some(arp),
            _ => None,
        }
    }

    pub fn as_arpeggiator_mut(&mut self) -> Option<&mut Arpeggiator> {
        match self {
            Generator::Arpeggiator(arp) => Some(arp),
            _ => None,
        }
    }

    pub fn as_sequencer(&self) -> Option<&Sequencer> {
        match self {
            Generator::Sequencer(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_sequencer_mut(&mut self) -> Option<&mut Sequencer> {
        match self {
            Generator::Sequencer(seq) => Some(seq),
            _ => None,
        }
    }
}

impl StepProducer for Generator {
    fn on_step(&mut self) -> Option<pk_ir::StepNotes> {
        match self {
            Generator::Arpeggiator(arp) => arp.on_step(),
            Generator::Sequencer(seq) => seq.on_step(),
        }
    }

    fn position(&self) -> Option<usize> {
        match self {
            Generator::Arpeggiator(arp) => StepProducer::position(arp),
            Generator::Sequencer(seq) => StepProducer::position(seq),
        }
    }

    fn hold(&mut self, notes: &[Note]) -> bool {
        match self {
            Generator::Arpeggiator(arp) => arp.hold(notes),
            Generator::Sequencer(seq) => seq.hold(notes),
        }
    }

    fn on_enable(&mut self) {
        match self {
            Generator::Arpeggiator(arp) => arp.on_enable(),
            Generator::Sequencer(seq) => seq.on_enable(),
        }
    }

    fn on_disable(&mut self) {
        match self {
            Generator::Arpeggiator(arp) => arp.on_disable(),
            Generator::Sequencer(seq) => seq.on_disable(),
        }
    }
}

/// Routes timer output into the voice pool.
struct VoiceSink<'a> {
    voices: &'a mut VoicePool,
    events: &'a mut EventQueue,
}

impl TimerListener for VoiceSink<'_> {
    fn press(&mut self, note: &Note) {
        self.voices.press(note, self.events);
    }

    fn release(&mut self, notenum: NoteNum) {
        self.voices.release_note(notenum, self.events);
    }

    fn step(&mut self, position: Option<usize>) {
        self.events.push(NoteEvent::Step { position });
    }
}

/// Polyphonic keyboard with a bounded voice pool.
pub struct Keyboard {
    /// Pitch of physical key 0
    root: NoteNum,
    mode: PriorityMode,
    /// Live (unsustained) notes, oldest first
    notes: Vec<Note, MAX_NOTES>,
    /// Notes kept alive by the sustain pedal
    sustained: Vec<Note, MAX_NOTES>,
    sustain: bool,
    voices: VoicePool,
    generator: Option<Timer<Generator>>,
    keys: AllocVec<Box<dyn KeySource + Send>>,
    events: EventQueue,
    /// Next note timestamp
    stamp: u64,
}

impl Keyboard {
    pub fn new(root: NoteNum, mode: PriorityMode, max_voices: usize) -> Self {
        Self {
            root,
            mode,
            notes: Vec::new(),
            sustained: Vec::new(),
            sustain: false,
            voices: VoicePool::new(max_voices),
            generator: None,
            keys: AllocVec::new(),
            events: EventQueue::new(),
            stamp: 0,
        }
    }

    // === Keys ===

    /// Add a physical key. Its note is `root + keynum`.
    pub fn add_key(&mut self, key: impl KeySource + Send + 'static) -> usize {
        self.keys.push(Box::new(key));
        self.keys.len() - 1
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn root(&self) -> NoteNum {
        self.root
    }

    /// Takes effect for the next key press.
    pub fn set_root(&mut self, root: NoteNum) {
        self.root = root;
    }

    /// Poll every key once, turning edges into appends and removes.
    pub fn update(&mut self) {
        for keynum in 0..self.keys.len() {
            let state = self.keys[keynum].check();
            let notenum = self.root + keynum as NoteNum;
            match state {
                KeyState::Press => {
                    let velocity = self.keys[keynum].velocity();
                    let note = self.append(notenum, velocity, Some(keynum));
                    self.events.push(NoteEvent::KeyPress { keynum, note });
                }
                KeyState::Release => {
                    self.events.push(NoteEvent::KeyRelease { keynum, notenum });
                    self.remove(notenum);
                }
                KeyState::None => {}
            }
        }
    }

    // === Note buffer ===

    /// Add a note, replacing any held note of the same pitch.
    pub fn append(&mut self, notenum: NoteNum, velocity: f32, keynum: Option<usize>) -> Note {
        retain_other_pitches(&mut self.notes, notenum);
        retain_other_pitches(&mut self.sustained, notenum);

        self.stamp += 1;
        let note = Note::new(notenum, velocity)
            .with_key(keynum)
            .with_timestamp(self.stamp);
        push_bounded(&mut self.notes, note);
        if self.sustain {
            push_bounded(&mut self.sustained, note);
        }
        log::trace!("append {}", notenum);
        self.evaluate();
        note
    }

    /// Lift a note. Under sustain the sustained copy stays.
    pub fn remove(&mut self, notenum: NoteNum) {
        self.remove_note(notenum, false);
    }

    /// Lift a note, dropping its sustained copy too.
    pub fn remove_forced(&mut self, notenum: NoteNum) {
        self.remove_note(notenum, true);
    }

    fn remove_note(&mut self, notenum: NoteNum, forced: bool) {
        if !self.has_note(notenum, true) {
            return;
        }
        retain_other_pitches(&mut self.notes, notenum);
        if forced || !self.sustain {
            retain_other_pitches(&mut self.sustained, notenum);
        }
        log::trace!("remove {}", notenum);
        self.evaluate();
    }

    /// Drop every held and sustained note.
    pub fn clear(&mut self) {
        self.notes.clear();
        self.sustained.clear();
        self.evaluate();
    }

    pub fn has_notes(&self, include_sustained: bool) -> bool {
        !self.notes.is_empty() || (include_sustained && self.sustain && !self.sustained.is_empty())
    }

    pub fn has_note(&self, notenum: NoteNum, include_sustained: bool) -> bool {
        pk_ir::contains_pitch(&self.notes, notenum)
            || (include_sustained && self.sustain && pk_ir::contains_pitch(&self.sustained, notenum))
    }

    /// Held notes in insertion order, live first, one per pitch.
    pub fn notes(&self, include_sustained: bool) -> HeldNotes {
        let mut held = HeldNotes::new();
        for note in &self.notes {
            let _ = held.push(*note);
        }
        if include_sustained && self.sustain {
            for note in &self.sustained {
                if !pk_ir::contains_pitch(&held, note.notenum) {
                    let _ = held.push(*note);
                }
            }
        }
        held
    }

    /// Up to `count` held notes, ordered by the priority mode.
    pub fn get(&self, count: usize) -> HeldNotes {
        let mut held = self.notes(true);
        match self.mode {
            PriorityMode::High => held.sort_unstable_by(|a, b| b.cmp_pitch(a)),
            PriorityMode::Low => held.sort_unstable_by(|a, b| a.cmp_pitch(b)),
            PriorityMode::Last => held.sort_unstable_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        }
        held.truncate(count);
        held
    }

    // === Settings ===

    pub fn mode(&self) -> PriorityMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PriorityMode) {
        if mode != self.mode {
            log::debug!("priority mode {}", mode.name());
            self.mode = mode;
            self.evaluate();
        }
    }

    pub fn sustain(&self) -> bool {
        self.sustain
    }

    pub fn set_sustain(&mut self, sustain: bool) {
        if sustain == self.sustain {
            return;
        }
        log::debug!("sustain {}", if sustain { "on" } else { "off" });
        self.sustain = sustain;
        self.sustained.clear();
        if sustain {
            self.sustained.clone_from(&self.notes);
        } else {
            self.evaluate();
        }
    }

    pub fn max_voices(&self) -> usize {
        self.voices.len()
    }

    /// Release all voices, rebuild the pool and re-evaluate.
    pub fn set_max_voices(&mut self, count: usize) {
        self.voices.resize(count, &mut self.events);
        self.evaluate();
    }

    // === Voices ===

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    pub fn active_voices(&self) -> usize {
        self.voices.active_count()
    }

    /// Re-run allocation against the current note set.
    pub fn force_update(&mut self) {
        self.evaluate();
    }

    fn evaluate(&mut self) {
        if self.generator_enabled() {
            let held = self.notes(true);
            if let Some(timer) = self.generator.as_mut() {
                timer.hold(&held);
            }
        } else {
            let desired = self.get(self.voices.len());
            self.voices.reconcile(&desired, &mut self.events);
        }
    }

    // === Generator ===

    pub fn attach_arpeggiator(&mut self, arpeggiator: Arpeggiator, clock: StepClock) {
        self.attach(Generator::Arpeggiator(arpeggiator), clock);
    }

    pub fn attach_sequencer(&mut self, sequencer: Sequencer, clock: StepClock) {
        self.attach(Generator::Sequencer(sequencer), clock);
    }

    /// Bind a generator, detaching any previous one. It starts disabled.
    pub fn attach(&mut self, generator: Generator, clock: StepClock) {
        self.detach();
        self.generator = Some(Timer::new(generator, clock));
    }

    /// Unbind the generator, disabling it first.
    pub fn detach(&mut self) -> Option<Timer<Generator>> {
        self.disable_generator();
        self.generator.take()
    }

    pub fn generator(&self) -> Option<&Timer<Generator>> {
        self.generator.as_ref()
    }

    /// Timing and producer settings. Enable and disable through the
    /// keyboard so voices are handed over correctly.
    pub fn generator_mut(&mut self) -> Option<&mut Timer<Generator>> {
        self.generator.as_mut()
    }

    pub fn arpeggiator_mut(&mut self) -> Option<&mut Arpeggiator> {
        self.generator
            .as_mut()
            .and_then(|t| t.producer_mut().as_arpeggiator_mut())
    }

    pub fn sequencer_mut(&mut self) -> Option<&mut Sequencer> {
        self.generator
            .as_mut()
            .and_then(|t| t.producer_mut().as_sequencer_mut())
    }

    pub fn generator_enabled(&self) -> bool {
        self.generator.as_ref().map_or(false, |t| t.is_enabled())
    }

    /// Hand voice control to the generator.
    pub fn enable_generator(&mut self) {
        if self.generator.is_none() || self.generator_enabled() {
            return;
        }
        self.voices.release_all(&mut self.events);
        let held = self.notes(true);
        if let Some(timer) = self.generator.as_mut() {
            timer.enable();
            timer.hold(&held);
        }
    }

    /// Take voice control back from the generator. A no-op when it is not
    /// running.
    pub fn disable_generator(&mut self) {
        if !self.generator_enabled() {
            return;
        }
        if let Some(timer) = self.generator.as_mut() {
            let mut sink = VoiceSink {
                voices: &mut self.voices,
                events: &mut self.events,
            };
            timer.disable(&mut sink);
        }
        self.evaluate();
    }

    pub fn toggle_generator(&mut self) {
        if self.generator_enabled() {
            self.disable_generator();
        } else {
            self.enable_generator();
        }
    }

    /// Advance the generator to `now`.
    pub fn tick(&mut self, now: Instant) {
        if let Some(timer) = self.generator.as_mut() {
            let mut sink = VoiceSink {
                voices: &mut self.voices,
                events: &mut self.events,
            };
            timer.update(now, &mut sink);
        }
    }

    // === Output ===

    /// Pop every pending output event, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = NoteEvent> + '_ {
        self.events.drain()
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new(48, PriorityMode::High, 1)
    }
}

fn retain_other_pitches<const N: usize>(notes: &mut Vec<Note, N>, notenum: NoteNum) {
    notes.retain(|n| !n.is_pitch(notenum));
}

/// Push, dropping the oldest note when full.
fn push_bounded<const N: usize>(notes: &mut Vec<Note, N>, note: Note) {
    if notes.is_full() {
        let dropped = notes.remove(0);
        log::warn!("note buffer full, dropping {}", dropped.notenum);
    }
    let _ = notes.push(note);
}
