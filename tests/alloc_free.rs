//! Allocation-free tick path tests.
//!
//! After setup, a scheduler tick runs the key scan, the generator timers,
//! voice allocation and the event flush. None of it may touch the heap.
//!
//! Just run `cargo test`, no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use std::time::Duration;

use pk_engine::{Clock, ManualClock, Scheduler, ScriptedKey};
use pk_ir::{ArpMode, InstrumentConfig, PriorityMode};
use pk_master::{Command, Instrument, Switch};
use pk_output::{LogBackend, RingBackend};

fn instrument(arp: bool) -> Instrument {
    let config = InstrumentConfig {
        max_voices: 4,
        priority_mode: PriorityMode::Last,
        arp_enabled: arp,
        arp_mode: ArpMode::UpDown,
        octaves: 2,
        ..InstrumentConfig::default()
    };
    let mut inst = Instrument::from_config(&config);
    inst.set_output(Box::new(LogBackend::new()));
    inst
}

/// Run `seconds` of simulated time with `body` called every iteration,
/// aborting on any heap allocation.
fn assert_ticks_alloc_free(
    inst: &mut Instrument,
    seconds: u64,
    mut body: impl FnMut(&mut Instrument, u64),
) {
    let mut scheduler = Scheduler::new();
    inst.register_tasks(&mut scheduler);
    let mut clock = ManualClock::new();

    // first ticks arm every task
    let d = scheduler.tick(inst, &clock);
    clock.sleep(d);

    let end = Duration::from_secs(seconds).as_micros() as u64;
    let mut i = 0u64;
    assert_no_alloc(|| {
        while clock.now().as_micros() < end {
            body(inst, i);
            let d = scheduler.tick(inst, &clock);
            clock.sleep(d);
            i += 1;
        }
    });
}

#[test]
fn direct_allocation_alloc_free() {
    let mut inst = instrument(false);
    assert_ticks_alloc_free(&mut inst, 5, |inst, i| {
        let n = 48 + (i % 24) as i32;
        if i % 3 == 0 {
            inst.apply(&Command::NoteOn {
                notenum: n,
                velocity: 0.9,
            });
        } else if i % 7 == 0 {
            inst.apply(&Command::NoteOff { notenum: n - 1 });
        }
        if i % 500 == 0 {
            inst.apply(&Command::Sustain(Switch::Toggle));
        }
    });
}

#[test]
fn arpeggiator_alloc_free() {
    let mut inst = instrument(true);
    for n in [60, 63, 67, 70] {
        inst.apply(&Command::NoteOn {
            notenum: n,
            velocity: 1.0,
        });
    }
    assert_ticks_alloc_free(&mut inst, 5, |inst, i| {
        if i % 1000 == 0 {
            inst.apply(&Command::ArpMode(ArpMode::from_index(i as usize / 1000)));
        }
        if i % 1500 == 0 {
            inst.apply(&Command::NoteOff { notenum: 63 });
        }
    });
}

#[test]
fn midi_and_drums_alloc_free() {
    let mut inst = instrument(false);
    inst.set_drum_output(Box::new(LogBackend::new()));
    for pos in 0..16 {
        inst.apply(&Command::DrumNote {
            position: pos,
            track: 0,
            notenum: 1 + (pos % 4) as i32,
            velocity: 1.0,
        });
    }
    inst.apply(&Command::Drums(Switch::On));

    assert_ticks_alloc_free(&mut inst, 3, |inst, i| {
        let note = 40 + (i % 20) as u8;
        inst.feed_midi(&[0x90, note, 100]);
        if i % 2 == 0 {
            inst.feed_midi(&[0x80, note, 0]);
        }
    });
}

#[test]
fn key_scan_and_ring_output_alloc_free() {
    let mut inst = instrument(false);
    let (backend, mut rx) = RingBackend::new(1024);
    inst.set_output(Box::new(backend));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let (key, handle) = ScriptedKey::new(0.8);
        inst.keyboard_mut().add_key(key);
        handles.push(handle);
    }

    assert_ticks_alloc_free(&mut inst, 2, |_, i| {
        let h = &handles[(i % 8) as usize];
        if i % 2 == 0 {
            h.press();
        } else {
            h.release();
        }
        while rx.try_recv().is_some() {}
    });
}
