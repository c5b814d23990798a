//! Back end that writes voice activity to the log.

use pk_ir::{Note, NoteNum};

use crate::traits::{BackendError, SynthBackend};

/// Logs every command at `info` and keeps a running count.
///
/// Useful headless, where no synthesis engine is attached.
#[derive(Debug, Default)]
pub struct LogBackend {
    presses: usize,
    releases: usize,
}

impl LogBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presses(&self) -> usize {
        self.presses
    }

    pub fn releases(&self) -> usize {
        self.releases
    }
}

impl SynthBackend for LogBackend {
    fn voice_press(&mut self, voice: usize, note: &Note) -> Result<(), BackendError> {
        self.presses += 1;
        log::info!(
            "voice {:>2} press   {:>3} vel {:.2}",
            voice,
            note.notenum,
            note.velocity
        );
        Ok(())
    }

    fn voice_release(&mut self, voice: usize, note: &Note) -> Result<(), BackendError> {
        self.releases += 1;
        log::info!("voice {:>2} release {:>3}", voice, note.notenum);
        Ok(())
    }

    fn key_press(&mut self, keynum: usize, note: &Note) -> Result<(), BackendError> {
        log::debug!("key {} down ({})", keynum, note.notenum);
        Ok(())
    }

    fn key_release(&mut self, keynum: usize, notenum: NoteNum) -> Result<(), BackendError> {
        log::debug!("key {} up ({})", keynum, notenum);
        Ok(())
    }

    fn step(&mut self, position: Option<usize>) -> Result<(), BackendError> {
        match position {
            Some(p) => log::debug!("step {}", p),
            None => log::debug!("step"),
        }
        Ok(())
    }
}
