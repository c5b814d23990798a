//! Headless controller for polykey.
//!
//! Loads configuration, assembles an [`Instrument`] and drives it either
//! live on a scheduler thread or offline against a simulated clock. The CLI
//! binaries share this API.

pub mod config;
mod instrument;
pub mod midi;
pub mod script;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use pk_engine::{Clock, ManualClock, Scheduler, StopHandle, SystemClock};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};

pub use config::ConfigError;
pub use instrument::{drum_voice, Drums, Instrument, Output, Part};
pub use midi::{MidiDecoder, MidiMessage};
pub use pk_ir::{Instant, InstrumentConfig, NoteEvent};
pub use script::{parse_line, parse_script, Command, GeneratorKind, ScriptError, Switch, TimedCommand};

/// Pending commands a live session can buffer.
pub const COMMAND_CAPACITY: usize = 256;

/// One event of an offline render.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rendered {
    pub at: Instant,
    pub part: Part,
    pub event: NoteEvent,
}

/// Owns the configuration and at most one live session.
pub struct Controller {
    config: InstrumentConfig,
    session: Option<SessionHandle>,
}

struct SessionHandle {
    stop: StopHandle,
    commands: HeapProd<Command>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(config: InstrumentConfig) -> Self {
        Self {
            config: config.sanitized(),
            session: None,
        }
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next start.
    pub fn set_config(&mut self, config: InstrumentConfig) {
        self.config = config.sanitized();
    }

    // --- Live session ---

    /// Start the instrument on its own thread, sending keyboard events to
    /// `output` and drum events to `drum_output` (or `output` if none).
    /// A running session is stopped first.
    pub fn start(&mut self, output: Output, drum_output: Option<Output>) {
        self.stop();

        let mut instrument = Instrument::from_config(&self.config);
        instrument.set_output(output);
        if let Some(drums) = drum_output {
            instrument.set_drum_output(drums);
        }

        let mut scheduler = Scheduler::new();
        instrument.register_tasks(&mut scheduler);

        let (commands, mut inbox) = HeapRb::<Command>::new(COMMAND_CAPACITY).split();
        scheduler.register(
            move |inst: &mut Instrument, _now: Instant| {
                while let Some(cmd) = inbox.try_pop() {
                    inst.apply(&cmd);
                }
            },
            self.config.keyboard_hz,
        );

        let stop = scheduler.stop_handle();
        let finished = Arc::new(AtomicBool::new(false));
        let done = finished.clone();
        let thread = std::thread::spawn(move || {
            let mut clock = SystemClock::new();
            scheduler.run(&mut instrument, &mut clock);
            done.store(true, Ordering::Relaxed);
        });

        log::info!("session started");
        self.session = Some(SessionHandle {
            stop,
            commands,
            finished,
            thread: Some(thread),
        });
    }

    /// Queue a command for the live session. Returns false if there is no
    /// session or its queue is full.
    pub fn send(&mut self, command: Command) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.commands.try_push(command) {
            Ok(()) => true,
            Err(cmd) => {
                log::warn!("command queue full, dropped {:?}", cmd);
                false
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop.stop();
            if let Some(handle) = session.thread.take() {
                let _ = handle.join();
            }
            log::info!("session stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.finished.load(Ordering::Relaxed))
    }

    // --- Offline rendering ---

    /// Run `script` against a simulated clock for `length` and return
    /// every event with the time it was produced.
    pub fn render(&self, script: &[TimedCommand], length: Duration) -> Vec<Rendered> {
        let mut instrument = Instrument::from_config(&self.config);
        let mut scheduler = Scheduler::new();
        instrument.register_tasks(&mut scheduler);

        let mut clock = ManualClock::new();
        let end = Instant::ZERO + length;
        let mut pending = script.iter().peekable();
        let mut out = Vec::new();

        loop {
            let now = clock.now();
            while let Some(cmd) = pending.next_if(|c| command_time(c) <= now) {
                instrument.apply(&cmd.command);
            }
            let sleep = scheduler.tick(&mut instrument, &clock);
            instrument.drain_with(|part, event| out.push(Rendered { at: now, part, event }));
            if now >= end {
                break;
            }

            let mut wake = (now + sleep).min(end);
            if let Some(next) = pending.peek() {
                wake = wake.min(command_time(next));
            }
            clock.set(wake);
        }
        out
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn command_time(cmd: &TimedCommand) -> Instant {
    Instant::from_secs_f32(cmd.at.unwrap_or(0.0))
}
