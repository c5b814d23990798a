//! Line-oriented control commands.
//!
//! One command per line, optionally prefixed by a time in seconds:
//!
//! ```text
//! # comment
//! 0.00 note-on 60 0.8
//! 0.25 note-off 60
//! 0.50 arp on
//! 1.00 midi 90 3c 64
//! ```

use pk_ir::{ArpMode, NoteNum, PriorityMode, StepDivision};
use thiserror::Error;

/// Latest time a script line may carry, in seconds (one day).
pub const MAX_TIME: f32 = 86_400.0;

/// On, off or flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
    Toggle,
}

impl Switch {
    /// New state given the current one.
    pub fn apply(self, current: bool) -> bool {
        match self {
            Switch::On => true,
            Switch::Off => false,
            Switch::Toggle => !current,
        }
    }
}

/// Which generator the keyboard hands its notes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorKind {
    Arpeggiator,
    Sequencer,
}

/// A control command for a running instrument.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    NoteOn { notenum: NoteNum, velocity: f32 },
    NoteOff { notenum: NoteNum },
    AllNotesOff,
    Sustain(Switch),
    Mode(PriorityMode),
    Voices(usize),
    Generator(GeneratorKind),
    Arp(Switch),
    ArpMode(ArpMode),
    Octaves(i32),
    Probability(f32),
    Bpm(f32),
    Gate(f32),
    Division(StepDivision),
    /// Edit the keyboard's sequencer pattern
    SeqNote {
        position: usize,
        track: usize,
        notenum: NoteNum,
        velocity: f32,
    },
    Drums(Switch),
    DrumNote {
        position: usize,
        track: usize,
        notenum: NoteNum,
        velocity: f32,
    },
    /// Up to three raw MIDI bytes
    Midi { bytes: [u8; 3], len: u8 },
}

impl Command {
    pub fn midi_bytes(&self) -> Option<&[u8]> {
        match self {
            Command::Midi { bytes, len } => Some(&bytes[..(*len as usize).min(bytes.len())]),
            _ => None,
        }
    }
}

/// A command with an optional start time in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedCommand {
    pub at: Option<f32>,
    pub command: Command,
}

#[derive(Debug, Error, PartialEq)]
pub enum ScriptError {
    #[error("line {line}: unknown command `{word}`")]
    UnknownCommand { line: usize, word: String },
    #[error("line {line}: `{command}` needs {expected}")]
    MissingArgument {
        line: usize,
        command: String,
        expected: &'static str,
    },
    #[error("line {line}: bad value `{value}`")]
    BadValue { line: usize, value: String },
    #[error("line {line}: time {at} is not after the previous command")]
    OutOfOrder { line: usize, at: f32 },
}

struct Args<'a> {
    line: usize,
    command: &'a str,
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn next(&mut self, expected: &'static str) -> Result<&'a str, ScriptError> {
        self.words.next().ok_or_else(|| ScriptError::MissingArgument {
            line: self.line,
            command: self.command.to_string(),
            expected,
        })
    }

    fn parse<T: std::str::FromStr>(&mut self, expected: &'static str) -> Result<T, ScriptError> {
        let word = self.next(expected)?;
        word.parse().map_err(|_| bad(self.line, word))
    }

    fn parse_or<T: std::str::FromStr>(&mut self, default: T) -> Result<T, ScriptError> {
        match self.words.next() {
            Some(word) => word.parse().map_err(|_| bad(self.line, word)),
            None => Ok(default),
        }
    }

    fn switch(&mut self) -> Result<Switch, ScriptError> {
        match self.words.next() {
            None | Some("toggle") => Ok(Switch::Toggle),
            Some("on") => Ok(Switch::On),
            Some("off") => Ok(Switch::Off),
            Some(word) => Err(bad(self.line, word)),
        }
    }

    fn named<T: Copy>(
        &mut self,
        all: &[T],
        key: impl Fn(&T) -> &'static str,
        expected: &'static str,
    ) -> Result<T, ScriptError> {
        let word = self.next(expected)?;
        all.iter()
            .find(|v| key(v) == word)
            .copied()
            .ok_or_else(|| bad(self.line, word))
    }
}

fn bad(line: usize, value: &str) -> ScriptError {
    ScriptError::BadValue {
        line,
        value: value.to_string(),
    }
}

/// Parse one line. Blank lines and comments yield `None`.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<TimedCommand>, ScriptError> {
    let text = line.split('#').next().unwrap_or("").trim();
    let mut words = text.split_whitespace();
    let Some(mut first) = words.next() else {
        return Ok(None);
    };

    let mut at = None;
    if first.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        let secs: f32 = first.parse().map_err(|_| bad(line_no, first))?;
        if !(0.0..=MAX_TIME).contains(&secs) {
            return Err(bad(line_no, first));
        }
        at = Some(secs);
        first = words.next().ok_or_else(|| ScriptError::MissingArgument {
            line: line_no,
            command: first.to_string(),
            expected: "a command after the time",
        })?;
    }

    let mut args = Args {
        line: line_no,
        command: first,
        words,
    };
    let command = match first {
        "note-on" | "on" => Command::NoteOn {
            notenum: args.parse("a note number")?,
            velocity: args.parse_or(1.0)?,
        },
        "note-off" | "off" => Command::NoteOff {
            notenum: args.parse("a note number")?,
        },
        "all-off" | "panic" => Command::AllNotesOff,
        "sustain" => Command::Sustain(args.switch()?),
        "mode" => Command::Mode(args.named(&PriorityMode::ALL, priority_key, "high, low or last")?),
        "voices" => Command::Voices(args.parse("a voice count")?),
        "generator" => match args.next("arp or seq")? {
            "arp" => Command::Generator(GeneratorKind::Arpeggiator),
            "seq" => Command::Generator(GeneratorKind::Sequencer),
            word => return Err(bad(line_no, word)),
        },
        "arp" => Command::Arp(args.switch()?),
        "arp-mode" => Command::ArpMode(args.named(&ArpMode::ALL, arp_key, "an arpeggio mode")?),
        "octaves" => Command::Octaves(args.parse("an octave count")?),
        "probability" => Command::Probability(args.parse("a probability")?),
        "bpm" => Command::Bpm(args.parse("a tempo")?),
        "gate" => Command::Gate(args.parse("a gate fraction")?),
        "division" => {
            Command::Division(args.named(&StepDivision::ALL, |d| d.name(), "a division like 1/8")?)
        }
        "seq-note" => Command::SeqNote {
            position: args.parse("a position")?,
            track: args.parse("a track")?,
            notenum: args.parse("a note number")?,
            velocity: args.parse_or(1.0)?,
        },
        "drums" => Command::Drums(args.switch()?),
        "drum" => Command::DrumNote {
            position: args.parse("a position")?,
            track: args.parse("a track")?,
            notenum: args.parse("a note number")?,
            velocity: args.parse_or(1.0)?,
        },
        "midi" => {
            let mut bytes = [0u8; 3];
            let mut len = 0;
            for word in args.words.by_ref() {
                if len == bytes.len() {
                    return Err(bad(line_no, word));
                }
                bytes[len] = u8::from_str_radix(word, 16).map_err(|_| bad(line_no, word))?;
                len += 1;
            }
            if len == 0 {
                return Err(ScriptError::MissingArgument {
                    line: line_no,
                    command: first.to_string(),
                    expected: "hex bytes",
                });
            }
            Command::Midi {
                bytes,
                len: len as u8,
            }
        }
        word => {
            return Err(ScriptError::UnknownCommand {
                line: line_no,
                word: word.to_string(),
            })
        }
    };
    Ok(Some(TimedCommand { at, command }))
}

/// Parse a whole script. Untimed lines inherit the previous line's time.
pub fn parse_script(text: &str) -> Result<Vec<TimedCommand>, ScriptError> {
    let mut out = Vec::new();
    let mut last = 0.0f32;
    for (i, line) in text.lines().enumerate() {
        let Some(mut cmd) = parse_line(i + 1, line)? else {
            continue;
        };
        match cmd.at {
            Some(at) if at < last => return Err(ScriptError::OutOfOrder { line: i + 1, at }),
            Some(at) => last = at,
            None => cmd.at = Some(last),
        }
        out.push(cmd);
    }
    Ok(out)
}

fn priority_key(mode: &PriorityMode) -> &'static str {
    match mode {
        PriorityMode::High => "high",
        PriorityMode::Low => "low",
        PriorityMode::Last => "last",
    }
}

fn arp_key(mode: &ArpMode) -> &'static str {
    match mode {
        ArpMode::Up => "up",
        ArpMode::Down => "down",
        ArpMode::UpDown => "up-down",
        ArpMode::DownUp => "down-up",
        ArpMode::Played => "played",
        ArpMode::Random => "random",
    }
}
