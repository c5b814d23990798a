//! VoicePool: bounded polyphony with reconcile-style allocation.
//!
//! The pool never steals. When more notes are wanted than voices are free,
//! the extra notes are dropped (starved) until a voice frees up.

use heapless::Vec;
use pk_ir::{Note, NoteEvent, NoteNum, MAX_VOICES};

use crate::event_queue::EventQueue;

/// One slot of the polyphony pool.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Voice {
    /// Stable index, 0..pool size
    pub index: usize,
    /// Note currently sounding, if any
    pub note: Option<Note>,
    /// Pool-local stamp of the last assignment
    pub time: u64,
}

impl Voice {
    fn new(index: usize) -> Self {
        Self {
            index,
            note: None,
            time: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.note.is_some()
    }

    /// True if this voice is sounding `notenum`.
    pub fn holds(&self, notenum: NoteNum) -> bool {
        self.note.map_or(false, |n| n.is_pitch(notenum))
    }
}

/// True if `voice` is sounding a note with the same pitch as `note`.
pub fn voice_holds(voice: &Voice, note: &Note) -> bool {
    voice.holds(note.notenum)
}

/// Fixed pool of voices.
#[derive(Clone, Debug)]
pub struct VoicePool {
    voices: Vec<Voice, MAX_VOICES>,
    /// Assignment counter feeding `Voice::time`
    clock: u64,
}

impl VoicePool {
    /// Create a pool of `count` voices (clamped to 1..=MAX_VOICES).
    pub fn new(count: usize) -> Self {
        let mut pool = Self {
            voices: Vec::new(),
            clock: 0,
        };
        pool.fill(count);
        pool
    }

    fn fill(&mut self, count: usize) {
        self.voices.clear();
        for index in 0..count.clamp(1, MAX_VOICES) {
            // Capacity is MAX_VOICES, so this cannot fail.
            let _ = self.voices.push(Voice::new(index));
        }
    }

    /// Release everything and rebuild the pool with indices 0..count.
    pub fn resize(&mut self, count: usize, events: &mut EventQueue) {
        self.release_all(events);
        self.fill(count);
        log::debug!("voice pool resized to {}", self.voices.len());
    }

    /// Number of voices.
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Index of a voice sounding `notenum`.
    pub fn find(&self, notenum: NoteNum) -> Option<usize> {
        self.voices.iter().position(|v| v.holds(notenum))
    }

    /// Make the sounding set match `desired`.
    ///
    /// Active voices whose pitch is still desired keep sounding untouched;
    /// every other active voice is released. Remaining desired notes go, in
    /// order, to the least recently assigned free voice until free voices run
    /// out. An empty `desired` releases everything.
    pub fn reconcile(&mut self, desired: &[Note], events: &mut EventQueue) {
        let desired = &desired[..desired.len().min(MAX_VOICES)];
        let mut satisfied = [false; MAX_VOICES];

        for voice in self.voices.iter_mut() {
            let Some(held) = voice.note else { continue };
            let kept = desired
                .iter()
                .enumerate()
                .position(|(i, n)| !satisfied[i] && n.same_pitch(&held));
            match kept {
                Some(i) => satisfied[i] = true,
                None => release(voice, events),
            }
        }

        for (note, _) in desired.iter().zip(satisfied).filter(|(_, done)| !done) {
            if self.assign(note, events).is_none() {
                log::trace!("voices exhausted, dropping {}", note.notenum);
                break;
            }
        }
    }

    /// Start `note` on the least recently assigned free voice.
    ///
    /// Returns the voice index, or `None` if the pitch is already sounding
    /// or no voice is free.
    pub fn press(&mut self, note: &Note, events: &mut EventQueue) -> Option<usize> {
        if self.find(note.notenum).is_some() {
            return None;
        }
        self.assign(note, events)
    }

    fn assign(&mut self, note: &Note, events: &mut EventQueue) -> Option<usize> {
        let voice = self
            .voices
            .iter_mut()
            .filter(|v| !v.is_active())
            .min_by_key(|v| (v.time, v.index))?;
        self.clock += 1;
        voice.note = Some(*note);
        voice.time = self.clock;
        log::trace!("voice {} press {}", voice.index, note.notenum);
        events.push(NoteEvent::VoicePress {
            voice: voice.index,
            note: *note,
        });
        Some(voice.index)
    }

    /// Release every voice sounding `notenum`. Returns how many were freed.
    pub fn release_note(&mut self, notenum: NoteNum, events: &mut EventQueue) -> usize {
        let mut freed = 0;
        for voice in self.voices.iter_mut().filter(|v| v.holds(notenum)) {
            release(voice, events);
            freed += 1;
        }
        freed
    }

    pub fn release_all(&mut self, events: &mut EventQueue) {
        for voice in self.voices.iter_mut().filter(|v| v.is_active()) {
            release(voice, events);
        }
    }
}

impl Default for VoicePool {
    fn default() -> Self {
        Self::new(1)
    }
}

fn release(voice: &mut Voice, events: &mut EventQueue) {
    if let Some(note) = voice.note.take() {
        log::trace!("voice {} release {}", voice.index, note.notenum);
        events.push(NoteEvent::VoiceRelease {
            voice: voice.index,
            note,
        });
    }
}
