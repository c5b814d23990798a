//! Physical key inputs polled by the keyboard.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU8, Ordering};

/// Result of polling a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyState {
    /// Nothing changed
    #[default]
    None,
    Press,
    Release,
}

/// A pollable key.
pub trait KeySource {
    /// Sample the key and report an edge, if any.
    fn check(&mut self) -> KeyState;

    /// Velocity of the last press. Simple switches report 1.0.
    fn velocity(&self) -> f32 {
        1.0
    }
}

/// Edge detector over a raw level.
///
/// A level change is accepted after `threshold` consecutive samples agree,
/// which filters contact bounce when polled at the keyboard scan rate.
pub struct DebouncedKey<F> {
    read: F,
    invert: bool,
    threshold: u8,
    level: bool,
    pending: u8,
}

impl<F: FnMut() -> bool> DebouncedKey<F> {
    /// Detect edges on `read` with no bounce filtering.
    pub fn new(read: F) -> Self {
        Self {
            read,
            invert: false,
            threshold: 1,
            level: false,
            pending: 0,
        }
    }

    /// Swap press and release, for active-low inputs.
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Require `samples` consistent reads before accepting a change.
    pub fn with_threshold(mut self, samples: u8) -> Self {
        self.threshold = samples.max(1);
        self
    }
}

impl<F: FnMut() -> bool> KeySource for DebouncedKey<F> {
    fn check(&mut self) -> KeyState {
        let raw = (self.read)();
        if raw == self.level {
            self.pending = 0;
            return KeyState::None;
        }
        self.pending += 1;
        if self.pending < self.threshold {
            return KeyState::None;
        }
        self.pending = 0;
        self.level = raw;
        match (raw, self.invert) {
            (true, false) | (false, true) => KeyState::Press,
            (false, false) | (true, true) => KeyState::Release,
        }
    }
}

const IDLE: u8 = 0;
const PRESS: u8 = 1;
const RELEASE: u8 = 2;

/// A key driven from code, for scripted input and tests.
///
/// The paired [`KeyHandle`] queues one edge at a time; the next `check`
/// consumes it.
pub struct ScriptedKey {
    state: Arc<AtomicU8>,
    velocity: f32,
}

/// Remote control for a [`ScriptedKey`].
#[derive(Clone)]
pub struct KeyHandle {
    state: Arc<AtomicU8>,
}

impl ScriptedKey {
    pub fn new(velocity: f32) -> (Self, KeyHandle) {
        let state = Arc::new(AtomicU8::new(IDLE));
        let key = Self {
            state: state.clone(),
            velocity: pk_ir::clamp_velocity(velocity),
        };
        (key, KeyHandle { state })
    }
}

impl KeySource for ScriptedKey {
    fn check(&mut self) -> KeyState {
        match self.state.swap(IDLE, Ordering::AcqRel) {
            PRESS => KeyState::Press,
            RELEASE => KeyState::Release,
            _ => KeyState::None,
        }
    }

    fn velocity(&self) -> f32 {
        self.velocity
    }
}

impl KeyHandle {
    pub fn press(&self) {
        self.state.store(PRESS, Ordering::Release);
    }

    pub fn release(&self) {
        self.state.store(RELEASE, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn edges_only() {
        let level = Cell::new(false);
        let mut key = DebouncedKey::new(|| level.get());
        assert_eq!(key.check(), KeyState::None);
        level.set(true);
        assert_eq!(key.check(), KeyState::Press);
        assert_eq!(key.check(), KeyState::None);
        level.set(false);
        assert_eq!(key.check(), KeyState::Release);
        assert_eq!(key.velocity(), 1.0);
    }

    #[test]
    fn inverted_input() {
        let level = Cell::new(false);
        let mut key = DebouncedKey::new(|| level.get()).inverted();
        level.set(true);
        assert_eq!(key.check(), KeyState::Release);
        level.set(false);
        assert_eq!(key.check(), KeyState::Press);
    }

    #[test]
    fn bounce_is_filtered() {
        let level = Cell::new(false);
        let mut key = DebouncedKey::new(|| level.get()).with_threshold(3);
        level.set(true);
        assert_eq!(key.check(), KeyState::None);
        level.set(false);
        assert_eq!(key.check(), KeyState::None);
        level.set(true);
        assert_eq!(key.check(), KeyState::None);
        assert_eq!(key.check(), KeyState::None);
        assert_eq!(key.check(), KeyState::Press);
    }

    #[test]
    fn scripted_key_consumes_edges() {
        let (mut key, handle) = ScriptedKey::new(0.7);
        assert_eq!(key.check(), KeyState::None);
        handle.press();
        assert_eq!(key.check(), KeyState::Press);
        assert_eq!(key.check(), KeyState::None);
        handle.release();
        assert_eq!(key.check(), KeyState::Release);
        assert_eq!(key.velocity(), 0.7);
    }
}
