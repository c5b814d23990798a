//! The assembled instrument: keyboard, generators, drums and MIDI input.
//!
//! [`Instrument`] is the scheduler context. Tasks registered by
//! [`Instrument::register_tasks`] scan the keys, step the generators and
//! flush events to the attached back ends.

use pk_engine::{
    Arpeggiator, EventQueue, Keyboard, Scheduler, Sequencer, StepClock, TaskKey, Timer,
    TimerListener,
};
use pk_ir::{Instant, InstrumentConfig, Note, NoteEvent, NoteNum};
use pk_output::SynthBackend;

use crate::midi::{MidiDecoder, MidiMessage, CC_ALL_NOTES_OFF, CC_SUSTAIN};
use crate::script::{Command, GeneratorKind};

/// Boxed back end owned by the instrument.
pub type Output = Box<dyn SynthBackend + Send>;

/// Where an event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Part {
    Keys,
    Drums,
}

/// Drum voice for a pitch: notes count up from 1, wrapping over the voices.
pub fn drum_voice(notenum: NoteNum, voices: usize) -> usize {
    (notenum - 1).rem_euclid(voices.max(1) as i32) as usize
}

struct DrumVoices<'a> {
    voices: usize,
    events: &'a mut EventQueue,
}

impl TimerListener for DrumVoices<'_> {
    fn press(&mut self, note: &Note) {
        self.events.push(NoteEvent::VoicePress {
            voice: drum_voice(note.notenum, self.voices),
            note: *note,
        });
    }

    fn release(&mut self, notenum: NoteNum) {
        self.events.push(NoteEvent::VoiceRelease {
            voice: drum_voice(notenum, self.voices),
            note: Note::new(notenum, 0.0),
        });
    }

    fn step(&mut self, position: Option<usize>) {
        self.events.push(NoteEvent::Step { position });
    }
}

/// A sequencer running on its own clock with a fixed pitch-to-voice map.
pub struct Drums {
    timer: Timer<Sequencer>,
    voices: usize,
    events: EventQueue,
}

impl Drums {
    pub fn new(sequencer: Sequencer, clock: StepClock, voices: usize) -> Self {
        Self {
            timer: Timer::new(sequencer, clock),
            voices: voices.max(1),
            events: EventQueue::new(),
        }
    }

    pub fn timer(&self) -> &Timer<Sequencer> {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut Timer<Sequencer> {
        &mut self.timer
    }

    pub fn sequencer_mut(&mut self) -> &mut Sequencer {
        self.timer.producer_mut()
    }

    pub fn is_enabled(&self) -> bool {
        self.timer.is_enabled()
    }

    pub fn enable(&mut self) {
        self.timer.enable();
    }

    pub fn disable(&mut self) {
        let mut sink = DrumVoices {
            voices: self.voices,
            events: &mut self.events,
        };
        self.timer.disable(&mut sink);
    }

    pub fn tick(&mut self, now: Instant) {
        let mut sink = DrumVoices {
            voices: self.voices,
            events: &mut self.events,
        };
        self.timer.update(now, &mut sink);
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = NoteEvent> + '_ {
        self.events.drain()
    }
}

/// Keyboard plus optional drums, MIDI input and back ends.
pub struct Instrument {
    config: InstrumentConfig,
    keyboard: Keyboard,
    drums: Option<Drums>,
    midi: MidiDecoder,
    output: Option<Output>,
    drum_output: Option<Output>,
}

impl Instrument {
    /// Build from a configuration. The arpeggiator is attached, and enabled
    /// if the configuration asks for it.
    pub fn from_config(config: &InstrumentConfig) -> Self {
        let config = config.sanitized();
        let mut keyboard = Keyboard::new(config.root_note, config.priority_mode, config.max_voices);
        keyboard.attach_arpeggiator(
            Arpeggiator::new(config.arp_mode, config.octaves, config.probability),
            step_clock(&config),
        );
        if config.arp_enabled {
            keyboard.enable_generator();
        }
        log::info!(
            "instrument: {} voices, {} priority, {} bpm",
            config.max_voices,
            config.priority_mode.name(),
            config.bpm
        );
        Self {
            midi: MidiDecoder::new(config.midi_channel),
            keyboard,
            drums: None,
            output: None,
            drum_output: None,
            config,
        }
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut Keyboard {
        &mut self.keyboard
    }

    pub fn drums(&self) -> Option<&Drums> {
        self.drums.as_ref()
    }

    /// The drum machine, created from the sequencer settings on first use.
    pub fn drums_mut(&mut self) -> &mut Drums {
        let config = &self.config;
        self.drums.get_or_insert_with(|| {
            Drums::new(
                Sequencer::new(config.sequencer_length, config.sequencer_tracks),
                step_clock(config),
                config.max_voices,
            )
        })
    }

    pub fn set_output(&mut self, output: Output) {
        self.output = Some(output);
    }

    pub fn set_drum_output(&mut self, output: Output) {
        self.drum_output = Some(output);
    }

    // --- Input ---

    pub fn handle_midi(&mut self, msg: MidiMessage) {
        match msg {
            MidiMessage::NoteOn { note, velocity, .. } => {
                self.keyboard
                    .append(note as NoteNum, velocity as f32 / 127.0, None);
            }
            MidiMessage::NoteOff { note, .. } => self.keyboard.remove(note as NoteNum),
            MidiMessage::ControlChange {
                controller: CC_SUSTAIN,
                value,
                ..
            } => self.keyboard.set_sustain(value >= 64),
            MidiMessage::ControlChange {
                controller: CC_ALL_NOTES_OFF,
                ..
            } => self.keyboard.clear(),
            other => log::debug!("midi: ignored {:?}", other),
        }
    }

    /// Decode raw MIDI bytes and handle every complete message.
    pub fn feed_midi(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if let Some(msg) = self.midi.feed(byte) {
                self.handle_midi(msg);
            }
        }
    }

    pub fn apply(&mut self, command: &Command) {
        log::debug!("command {:?}", command);
        let kb = &mut self.keyboard;
        match *command {
            Command::NoteOn { notenum, velocity } => {
                kb.append(notenum, velocity, None);
            }
            Command::NoteOff { notenum } => kb.remove(notenum),
            Command::AllNotesOff => kb.clear(),
            Command::Sustain(switch) => {
                let on = switch.apply(kb.sustain());
                kb.set_sustain(on);
            }
            Command::Mode(mode) => kb.set_mode(mode),
            Command::Voices(count) => kb.set_max_voices(count),
            Command::Generator(kind) => self.use_generator(kind),
            Command::Arp(switch) => {
                if switch.apply(kb.generator_enabled()) {
                    kb.enable_generator();
                } else {
                    kb.disable_generator();
                }
            }
            Command::ArpMode(mode) => {
                if let Some(arp) = kb.arpeggiator_mut() {
                    arp.set_mode(mode);
                }
            }
            Command::Octaves(octaves) => {
                if let Some(arp) = kb.arpeggiator_mut() {
                    arp.set_octaves(octaves);
                }
            }
            Command::Probability(p) => {
                if let Some(arp) = kb.arpeggiator_mut() {
                    arp.set_probability(p);
                }
            }
            Command::Bpm(bpm) => self.each_timer(|t| t.set_bpm(bpm), |t| t.set_bpm(bpm)),
            Command::Gate(gate) => self.each_timer(|t| t.set_gate(gate), |t| t.set_gate(gate)),
            Command::Division(d) => self.each_timer(|t| t.set_division(d), |t| t.set_division(d)),
            Command::SeqNote {
                position,
                track,
                notenum,
                velocity,
            } => {
                if let Some(seq) = kb.sequencer_mut() {
                    seq.set_note(position, track, notenum, velocity);
                }
            }
            Command::Drums(switch) => {
                let drums = self.drums_mut();
                if switch.apply(drums.is_enabled()) {
                    drums.enable();
                } else {
                    drums.disable();
                }
            }
            Command::DrumNote {
                position,
                track,
                notenum,
                velocity,
            } => self
                .drums_mut()
                .sequencer_mut()
                .set_note(position, track, notenum, velocity),
            Command::Midi { .. } => {
                if let Some(bytes) = command.midi_bytes() {
                    self.feed_midi(bytes);
                }
            }
        }
    }

    fn each_timer(
        &mut self,
        mut keys: impl FnMut(&mut Timer<pk_engine::Generator>),
        mut drums: impl FnMut(&mut Timer<Sequencer>),
    ) {
        if let Some(timer) = self.keyboard.generator_mut() {
            keys(timer);
        }
        if let Some(d) = self.drums.as_mut() {
            drums(d.timer_mut());
        }
    }

    /// Swap the keyboard generator, keeping its clock and enabled state.
    fn use_generator(&mut self, kind: GeneratorKind) {
        let current = match self.keyboard.generator() {
            Some(t) => t.producer().as_sequencer().is_some(),
            None => false,
        };
        let wanted = kind == GeneratorKind::Sequencer;
        if current == wanted && self.keyboard.generator().is_some() {
            return;
        }

        let enabled = self.keyboard.generator_enabled();
        self.keyboard.disable_generator();
        let clock = self
            .keyboard
            .detach()
            .map_or_else(|| step_clock(&self.config), |t| *t.clock());
        match kind {
            GeneratorKind::Arpeggiator => self.keyboard.attach_arpeggiator(
                Arpeggiator::new(self.config.arp_mode, self.config.octaves, self.config.probability),
                clock,
            ),
            GeneratorKind::Sequencer => self.keyboard.attach_sequencer(
                Sequencer::new(self.config.sequencer_length, self.config.sequencer_tracks),
                clock,
            ),
        }
        if enabled {
            self.keyboard.enable_generator();
        }
    }

    // --- Periodic work ---

    /// Poll the physical keys.
    pub fn scan(&mut self) {
        self.keyboard.update();
    }

    /// Step the generators to `now`.
    pub fn tick(&mut self, now: Instant) {
        self.keyboard.tick(now);
        if let Some(drums) = self.drums.as_mut() {
            drums.tick(now);
        }
    }

    // --- Output ---

    /// Hand pending events to `f`, keyboard first.
    pub fn drain_with(&mut self, mut f: impl FnMut(Part, NoteEvent)) {
        for event in self.keyboard.drain_events() {
            f(Part::Keys, event);
        }
        if let Some(drums) = self.drums.as_mut() {
            for event in drums.drain_events() {
                f(Part::Drums, event);
            }
        }
    }

    /// Flush pending events to the attached back ends. Drums without a
    /// back end of their own share the keyboard's. Events stay queued
    /// only when no back end is attached at all.
    pub fn flush(&mut self) {
        if let Some(out) = self.output.as_mut() {
            deliver(self.keyboard.drain_events(), out.as_mut());
        }
        if let Some(drums) = self.drums.as_mut() {
            if let Some(out) = self.drum_output.as_mut().or(self.output.as_mut()) {
                deliver(drums.drain_events(), out.as_mut());
            }
        }
    }

    /// Register the key scan and the generator tick.
    pub fn register_tasks(&self, scheduler: &mut Scheduler<Instrument>) -> (TaskKey, TaskKey) {
        let scan = scheduler.register(
            |inst: &mut Instrument, _now: Instant| {
                inst.scan();
                inst.flush();
            },
            self.config.keyboard_hz,
        );
        let tick = scheduler.register(
            |inst: &mut Instrument, now: Instant| {
                inst.tick(now);
                inst.flush();
            },
            self.config.timer_hz,
        );
        (scan, tick)
    }
}

fn step_clock(config: &InstrumentConfig) -> StepClock {
    StepClock::with_division(config.bpm, config.step_division, config.gate)
}

/// Failures are logged and the event is dropped.
fn deliver<B: SynthBackend + ?Sized>(events: impl Iterator<Item = NoteEvent>, backend: &mut B) {
    for event in events {
        if let Err(e) = backend.handle(&event) {
            log::warn!("dropped {:?}: {}", event, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pk_output::{LogBackend, RingBackend, VoiceCommand};

    fn config() -> InstrumentConfig {
        InstrumentConfig {
            max_voices: 2,
            ..InstrumentConfig::default()
        }
    }

    fn pressed(inst: &mut Instrument) -> Vec<NoteNum> {
        let mut out = Vec::new();
        inst.drain_with(|_, e| {
            if let NoteEvent::VoicePress { note, .. } = e {
                out.push(note.notenum);
            }
        });
        out
    }

    #[test]
    fn midi_notes_reach_the_keyboard() {
        let mut inst = Instrument::from_config(&config());
        inst.feed_midi(&[0x90, 60, 127, 64, 64]);
        assert_eq!(pressed(&mut inst), [60, 64]);

        inst.feed_midi(&[0x80, 60, 0]);
        assert!(!inst.keyboard().has_note(60, true));
    }

    #[test]
    fn sustain_pedal_and_all_notes_off() {
        let mut inst = Instrument::from_config(&config());
        inst.feed_midi(&[0xB0, 64, 127, 0x90, 60, 100, 0x80, 60, 0]);
        assert!(inst.keyboard().sustain());
        assert!(inst.keyboard().has_note(60, true));

        inst.feed_midi(&[0xB0, 123, 0]);
        assert!(!inst.keyboard().has_notes(true));
        assert_eq!(inst.keyboard().active_voices(), 0);
    }

    #[test]
    fn midi_channel_filter_from_config() {
        let cfg = InstrumentConfig {
            midi_channel: 3,
            ..config()
        };
        let mut inst = Instrument::from_config(&cfg);
        inst.feed_midi(&[0x90, 60, 100, 0x92, 62, 100]);
        assert_eq!(pressed(&mut inst), [62]);
    }

    #[test]
    fn arp_enabled_from_config() {
        let cfg = InstrumentConfig {
            arp_enabled: true,
            ..config()
        };
        let inst = Instrument::from_config(&cfg);
        assert!(inst.keyboard().generator_enabled());
    }

    #[test]
    fn switching_to_sequencer_keeps_enabled_state() {
        let mut inst = Instrument::from_config(&config());
        inst.apply(&Command::Arp(crate::Switch::On));
        inst.apply(&Command::Generator(GeneratorKind::Sequencer));
        assert!(inst.keyboard_mut().sequencer_mut().is_some());
        assert!(inst.keyboard().generator_enabled());

        inst.apply(&Command::SeqNote {
            position: 0,
            track: 0,
            notenum: 40,
            velocity: 1.0,
        });
        inst.tick(Instant::ZERO);
        assert_eq!(pressed(&mut inst), [40]);
    }

    #[test]
    fn drum_voice_mapping() {
        assert_eq!(drum_voice(1, 4), 0);
        assert_eq!(drum_voice(4, 4), 3);
        assert_eq!(drum_voice(5, 4), 0);
        assert_eq!(drum_voice(0, 4), 3);
    }

    #[test]
    fn drums_run_on_their_own_voices() {
        let mut inst = Instrument::from_config(&config());
        inst.apply(&Command::DrumNote {
            position: 0,
            track: 0,
            notenum: 2,
            velocity: 1.0,
        });
        inst.apply(&Command::Drums(crate::Switch::On));
        inst.tick(Instant::ZERO);

        let mut drum_events = Vec::new();
        inst.drain_with(|part, e| {
            if part == Part::Drums {
                drum_events.push(e);
            }
        });
        assert!(drum_events.iter().any(|e| matches!(
            e,
            NoteEvent::VoicePress { voice: 1, note } if note.notenum == 2
        )));
        assert!(drum_events.contains(&NoteEvent::Step { position: Some(0) }));
    }

    fn run_drums(inst: &mut Instrument, millis: u64, mut each: impl FnMut()) {
        inst.apply(&Command::DrumNote {
            position: 0,
            track: 0,
            notenum: 3,
            velocity: 1.0,
        });
        inst.apply(&Command::Drums(crate::Switch::On));
        for ms in 0..millis {
            inst.tick(Instant::from_millis(ms));
            inst.flush();
            each();
        }
    }

    fn leftover_drum_events(inst: &mut Instrument) -> usize {
        let mut left = 0;
        inst.drain_with(|part, _| {
            if part == Part::Drums {
                left += 1;
            }
        });
        left
    }

    #[test]
    fn drums_share_the_keyboard_output() {
        let (backend, mut rx) = RingBackend::new(64);
        let mut inst = Instrument::from_config(&config());
        inst.set_output(Box::new(backend));

        let mut presses = Vec::new();
        run_drums(&mut inst, 10_000, || {
            presses.extend(rx.drain().filter(|c| matches!(c, VoiceCommand::Press { .. })));
        });
        assert_eq!(leftover_drum_events(&mut inst), 0);
        assert!(!presses.is_empty());
        assert!(presses.iter().all(|c| *c
            == VoiceCommand::Press {
                voice: 0,
                notenum: 3,
                velocity: 1.0
            }));
    }

    #[test]
    fn drums_prefer_their_own_output() {
        let (keys, mut key_rx) = RingBackend::new(64);
        let (drums, mut drum_rx) = RingBackend::new(64);
        let mut inst = Instrument::from_config(&config());
        inst.set_output(Box::new(keys));
        inst.set_drum_output(Box::new(drums));

        let mut drum_commands = 0;
        run_drums(&mut inst, 1_000, || drum_commands += drum_rx.drain().count());
        assert!(drum_commands > 0);
        assert!(key_rx.is_empty());
        assert_eq!(leftover_drum_events(&mut inst), 0);
    }

    #[test]
    fn flush_delivers_to_output() {
        let mut inst = Instrument::from_config(&config());
        inst.set_output(Box::new(LogBackend::new()));
        inst.apply(&Command::NoteOn {
            notenum: 60,
            velocity: 1.0,
        });
        inst.flush();
        assert!(inst.keyboard().events().is_empty());
    }
}
