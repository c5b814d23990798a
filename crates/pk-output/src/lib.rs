//! Synthesis back ends for polykey.
//!
//! The instrument drains its engine events into a [`SynthBackend`]. Two are
//! provided: [`LogBackend`] for headless runs and [`RingBackend`], which hands
//! voice commands to a synthesis thread over a lock-free ring buffer.

mod log_backend;
mod ring_backend;
mod traits;

pub use log_backend::LogBackend;
pub use ring_backend::{RingBackend, RingReceiver, VoiceCommand};
pub use traits::{BackendError, SynthBackend};
