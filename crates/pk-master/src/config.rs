//! Instrument configuration files.
//!
//! Defaults ship embedded in the binary. A user file (named by
//! `POLYKEY_CONFIG`, or passed explicitly) is merged over them key by key.

use std::path::{Path, PathBuf};

use pk_ir::{ArpMode, InstrumentConfig, NoteNum, PriorityMode, StepDivision};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Environment variable naming the user override file.
pub const CONFIG_ENV: &str = "POLYKEY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    keyboard: KeyboardSection,
    timer: TimerSection,
    arpeggiator: ArpSection,
    sequencer: SequencerSection,
    midi: MidiSection,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct KeyboardSection {
    root_note: Option<NoteNum>,
    priority_mode: Option<PriorityMode>,
    max_voices: Option<usize>,
    scan_hz: Option<u32>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TimerSection {
    bpm: Option<f32>,
    step_division: Option<StepDivision>,
    gate: Option<f32>,
    hz: Option<u32>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ArpSection {
    enabled: Option<bool>,
    mode: Option<ArpMode>,
    octaves: Option<i32>,
    probability: Option<f32>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SequencerSection {
    length: Option<usize>,
    tracks: Option<usize>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MidiSection {
    channel: Option<u8>,
}

macro_rules! take {
    ($dst:expr, $src:expr) => {
        if let Some(v) = $src {
            $dst = v;
        }
    };
}

impl ConfigFile {
    fn apply(self, cfg: &mut InstrumentConfig) {
        take!(cfg.root_note, self.keyboard.root_note);
        take!(cfg.priority_mode, self.keyboard.priority_mode);
        take!(cfg.max_voices, self.keyboard.max_voices);
        take!(cfg.keyboard_hz, self.keyboard.scan_hz);

        take!(cfg.bpm, self.timer.bpm);
        take!(cfg.step_division, self.timer.step_division);
        take!(cfg.gate, self.timer.gate);
        take!(cfg.timer_hz, self.timer.hz);

        take!(cfg.arp_enabled, self.arpeggiator.enabled);
        take!(cfg.arp_mode, self.arpeggiator.mode);
        take!(cfg.octaves, self.arpeggiator.octaves);
        take!(cfg.probability, self.arpeggiator.probability);

        take!(cfg.sequencer_length, self.sequencer.length);
        take!(cfg.sequencer_tracks, self.sequencer.tracks);

        take!(cfg.midi_channel, self.midi.channel);
    }
}

/// Parse a TOML document over `base`. Missing keys keep their base value.
pub fn merge_str(base: &InstrumentConfig, text: &str) -> Result<InstrumentConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(text)?;
    let mut cfg = base.clone();
    file.apply(&mut cfg);
    Ok(cfg)
}

/// The embedded defaults.
pub fn defaults() -> InstrumentConfig {
    match merge_str(&InstrumentConfig::default(), DEFAULT_CONFIG) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!(target: "config", "embedded config is broken: {e}");
            InstrumentConfig::default()
        }
    }
}

/// Load an explicit config file over the embedded defaults.
///
/// Unlike [`load`], a missing or malformed file is an error.
pub fn load_file(path: &Path) -> Result<InstrumentConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = merge_str(&defaults(), &text)?;
    Ok(finish(cfg))
}

/// Load the embedded defaults plus the user override, if one is set.
///
/// A broken user file is logged and skipped.
pub fn load() -> InstrumentConfig {
    let base = defaults();
    let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) else {
        return finish(base);
    };
    let merged = std::fs::read_to_string(&path)
        .map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })
        .and_then(|text| merge_str(&base, &text));
    match merged {
        Ok(cfg) => finish(cfg),
        Err(e) => {
            log::warn!(target: "config", "ignoring {}: {e}", path.display());
            finish(base)
        }
    }
}

fn finish(cfg: InstrumentConfig) -> InstrumentConfig {
    let clean = cfg.sanitized();
    if clean != cfg {
        log::warn!(target: "config", "out-of-range values clamped");
    }
    clean
}
