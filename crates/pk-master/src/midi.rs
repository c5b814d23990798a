//! MIDI byte stream decoding.

/// Sustain pedal controller.
pub const CC_SUSTAIN: u8 = 64;
/// All-notes-off controller.
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// A decoded channel message. Channels are 1-16.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Centered at zero, -8192..=8191
    PitchBend { channel: u8, value: i16 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiMessage {
    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::PitchBend { channel, .. }
            | MidiMessage::ProgramChange { channel, .. } => channel,
        }
    }
}

/// Incremental decoder with running status.
///
/// Feed bytes one at a time. Realtime bytes are ignored without disturbing
/// a message in progress. System exclusive data is skipped. Aftertouch is
/// parsed and dropped.
#[derive(Clone, Debug, Default)]
pub struct MidiDecoder {
    /// 1-16, or 0 for every channel
    channel: u8,
    status: Option<u8>,
    data: [u8; 2],
    len: usize,
    in_sysex: bool,
}

impl MidiDecoder {
    pub fn new(channel: u8) -> Self {
        Self {
            channel: channel.min(16),
            ..Self::default()
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel.min(16);
    }

    /// Forget any partial message and the running status.
    pub fn reset(&mut self) {
        self.status = None;
        self.len = 0;
        self.in_sysex = false;
    }

    /// Consume one byte, returning a message when one completes.
    pub fn feed(&mut self, byte: u8) -> Option<MidiMessage> {
        if byte >= 0xF8 {
            return None;
        }
        if byte >= 0x80 {
            self.len = 0;
            match byte {
                0xF0 => {
                    self.status = None;
                    self.in_sysex = true;
                }
                0xF7 => self.in_sysex = false,
                0xF1..=0xF6 => {
                    self.status = None;
                    self.in_sysex = false;
                }
                _ => {
                    self.status = Some(byte);
                    self.in_sysex = false;
                }
            }
            return None;
        }
        if self.in_sysex {
            return None;
        }

        let status = self.status?;
        self.data[self.len] = byte;
        self.len += 1;
        if self.len < data_len(status) {
            return None;
        }
        self.len = 0;

        let msg = decode(status, self.data)?;
        if self.channel != 0 && msg.channel() != self.channel {
            return None;
        }
        Some(msg)
    }

    /// Decode a run of bytes.
    pub fn decode<'a>(&'a mut self, bytes: &'a [u8]) -> impl Iterator<Item = MidiMessage> + 'a {
        bytes.iter().filter_map(move |&b| self.feed(b))
    }
}

fn data_len(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 1,
        _ => 2,
    }
}

fn decode(status: u8, data: [u8; 2]) -> Option<MidiMessage> {
    let channel = (status & 0x0F) + 1;
    let [a, b] = data;
    let msg = match status & 0xF0 {
        0x80 => MidiMessage::NoteOff { channel, note: a },
        0x90 if b == 0 => MidiMessage::NoteOff { channel, note: a },
        0x90 => MidiMessage::NoteOn {
            channel,
            note: a,
            velocity: b,
        },
        0xB0 => MidiMessage::ControlChange {
            channel,
            controller: a,
            value: b,
        },
        0xC0 => MidiMessage::ProgramChange { channel, program: a },
        0xE0 => MidiMessage::PitchBend {
            channel,
            value: ((b as i16) << 7 | a as i16) - 8192,
        },
        _ => return None,
    };
    Some(msg)
}
