//! End-to-end behaviour of the keyboard, generators and timer.

use std::time::Duration;

use approx::assert_relative_eq;
use pk_engine::{
    Arpeggiator, Clock, EventQueue, Keyboard, ManualClock, StepClock, StepProducer, Timer,
    TimerListener, VoicePool,
};
use pk_ir::{ArpMode, Instant, Note, NoteEvent, NoteNum, PriorityMode};

/// Deterministic pseudo-random walk over note operations.
struct Lcg(u64);

impl Lcg {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn sounding(kb: &Keyboard) -> Vec<NoteNum> {
    let mut v: Vec<_> = kb
        .voices()
        .voices()
        .iter()
        .filter_map(|v| v.note.map(|n| n.notenum))
        .collect();
    v.sort();
    v
}

fn arp_presses(kb: &mut Keyboard, steps: usize, step: Duration) -> Vec<NoteNum> {
    let mut now = Instant::ZERO;
    let mut out = Vec::new();
    for _ in 0..steps {
        kb.tick(now);
        for e in kb.drain_events() {
            if let NoteEvent::VoicePress { note, .. } = e {
                out.push(note.notenum);
            }
        }
        now += step;
    }
    out
}

#[test]
fn voice_count_never_exceeds_pool() {
    for voices in [1, 2, 3, 5, 8] {
        for mode in PriorityMode::ALL {
            let mut kb = Keyboard::new(48, mode, voices);
            let mut rng = Lcg(voices as u64 * 31 + mode.index() as u64);
            for _ in 0..2000 {
                let n = 40 + (rng.next_u64() % 30) as NoteNum;
                match rng.next_u64() % 10 {
                    0..=4 => {
                        kb.append(n, 1.0, None);
                    }
                    5..=7 => kb.remove(n),
                    8 => kb.set_sustain(!kb.sustain()),
                    _ => kb.remove_forced(n),
                }
                kb.drain_events().for_each(drop);
                assert!(kb.active_voices() <= voices);
                assert!(kb.active_voices() <= kb.max_voices());
            }
        }
    }
}

#[test]
fn sustain_holds_voice_until_pedal_up() {
    let mut kb = Keyboard::new(48, PriorityMode::High, 4);
    kb.append(60, 1.0, None);
    kb.append(64, 1.0, None);
    kb.set_sustain(true);
    kb.remove(60);
    kb.drain_events().for_each(drop);

    assert_eq!(sounding(&kb), [60, 64]);
    kb.remove(64);
    assert!(!kb.drain_events().any(|e| e.is_voice_release()));

    kb.set_sustain(false);
    let released: Vec<_> = kb
        .drain_events()
        .filter(|e| e.is_voice_release())
        .filter_map(|e| e.notenum())
        .collect();
    assert_eq!(released.len(), 2);
    assert!(sounding(&kb).is_empty());
}

#[test]
fn notes_pressed_under_sustain_are_kept() {
    let mut kb = Keyboard::new(48, PriorityMode::High, 4);
    kb.set_sustain(true);
    kb.append(67, 1.0, None);
    kb.remove(67);
    assert_eq!(sounding(&kb), [67]);
    assert!(kb.has_note(67, true));
    assert!(!kb.has_note(67, false));
}

#[test]
fn priority_selects_one_note() {
    let unsorted = [64, 55, 71, 60, 67];
    let pick = |mode| {
        let mut kb = Keyboard::new(48, mode, 1);
        for n in unsorted {
            kb.append(n, 1.0, None);
        }
        sounding(&kb)
    };
    assert_eq!(pick(PriorityMode::High), [71]);
    assert_eq!(pick(PriorityMode::Low), [55]);
    assert_eq!(pick(PriorityMode::Last), [67]);
}

#[test]
fn arpeggio_up_cycles() {
    let mut kb = Keyboard::new(48, PriorityMode::High, 4);
    kb.attach_arpeggiator(
        Arpeggiator::new(ArpMode::Up, 0, 1.0),
        StepClock::new(120.0, 2.0, 0.5),
    );
    kb.enable_generator();
    for n in [67, 60, 64] {
        kb.append(n, 1.0, None);
    }
    let played = arp_presses(&mut kb, 7, Duration::from_millis(250));
    assert_eq!(played, [60, 64, 67, 60, 64, 67, 60]);
}

#[test]
fn arpeggio_up_down_does_not_repeat_endpoints() {
    let mut kb = Keyboard::new(48, PriorityMode::High, 4);
    kb.attach_arpeggiator(
        Arpeggiator::new(ArpMode::UpDown, 0, 1.0),
        StepClock::new(120.0, 2.0, 0.5),
    );
    for n in [60, 64, 67] {
        kb.append(n, 1.0, None);
    }
    kb.enable_generator();
    kb.drain_events().for_each(drop);
    let played = arp_presses(&mut kb, 8, Duration::from_millis(250));
    assert_eq!(played, [60, 64, 67, 64, 60, 64, 67, 64]);
}

#[test]
fn octave_stacking() {
    let mut arp = Arpeggiator::new(ArpMode::Played, 1, 1.0);
    arp.update_notes(&[Note::new(60, 1.0)]);
    let pitches: Vec<_> = arp.notes().iter().map(|n| n.notenum).collect();
    assert_eq!(pitches, [60, 72]);
}

#[derive(Default)]
struct Log {
    presses: Vec<(NoteNum, Instant)>,
    releases: Vec<(NoteNum, Instant)>,
    now: Instant,
}

impl TimerListener for Log {
    fn press(&mut self, note: &Note) {
        self.presses.push((note.notenum, self.now));
    }

    fn release(&mut self, notenum: NoteNum) {
        self.releases.push((notenum, self.now));
    }
}

struct Drone;

impl StepProducer for Drone {
    fn on_step(&mut self) -> Option<pk_ir::StepNotes> {
        let mut notes = pk_ir::StepNotes::new();
        notes.push(Note::new(48, 1.0));
        Some(notes)
    }
}

#[test]
fn gate_law() {
    let tick = Duration::from_millis(1);
    let mut timer = Timer::new(Drone, StepClock::new(120.0, 1.0, 0.5));
    assert_relative_eq!(timer.gate_duration().as_secs_f64(), 0.25, epsilon = 1e-6);

    let mut log = Log::default();
    let mut clock = ManualClock::new();
    timer.enable();
    while clock.now() < Instant::from_secs_f32(3.0) {
        log.now = clock.now();
        timer.update(log.now, &mut log);
        clock.sleep(tick);
    }

    assert_eq!(log.presses.len(), 6);
    for ((_, pressed), (_, released)) in log.presses.iter().zip(&log.releases) {
        let held = released.saturating_duration_since(*pressed);
        assert!(held >= Duration::from_millis(250), "held {:?}", held);
        assert!(held < Duration::from_millis(250) + tick, "held {:?}", held);
    }
}

#[test]
fn disable_twice_releases_once() {
    let mut timer = Timer::new(Drone, StepClock::new(120.0, 1.0, 1.0));
    let mut log = Log::default();
    timer.enable();
    timer.update(Instant::ZERO, &mut log);
    assert_eq!(timer.open_notes(), [48]);

    timer.disable(&mut log);
    timer.disable(&mut log);
    assert_eq!(log.releases.len(), 1);
    assert!(timer.open_notes().is_empty());
}

#[test]
fn reconcile_twice_is_quiet() {
    let mut pool = VoicePool::new(4);
    let mut events = EventQueue::new();
    let desired: Vec<_> = [72, 60, 64].iter().map(|&n| Note::new(n, 1.0)).collect();

    pool.reconcile(&desired, &mut events);
    assert_eq!(events.len(), 3);
    events.clear();

    pool.reconcile(&desired, &mut events);
    assert!(events.is_empty());
}

#[test]
fn generator_hand_over() {
    let mut kb = Keyboard::new(48, PriorityMode::High, 2);
    kb.attach_arpeggiator(Arpeggiator::default(), StepClock::default());
    kb.append(60, 1.0, None);
    kb.append(64, 1.0, None);
    kb.drain_events().for_each(drop);

    kb.enable_generator();
    assert_eq!(kb.active_voices(), 0, "direct voices released");
    kb.tick(Instant::ZERO);
    assert_eq!(sounding(&kb), [60]);

    kb.disable_generator();
    assert_eq!(sounding(&kb), [60, 64], "held notes allocated again");
}
