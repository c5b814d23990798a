//! polykey CLI - offline render of a command script.
//!
//! Usage:
//!   pk-cli script.txt [--seconds 4] [--config polykey.toml]
//!
//! Runs the script against a simulated clock and prints every event.

use std::path::Path;
use std::time::Duration;
use std::{env, fs};

use pk_ir::NoteEvent;
use pk_master::script::MAX_TIME;
use pk_master::{config, parse_script, Controller, Part, Rendered};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let path = args.get(1).unwrap_or_else(|| {
        eprintln!("Usage: pk-cli <script> [--seconds N] [--config file.toml]");
        std::process::exit(1);
    });
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let config = match flag("--config") {
        Some(p) => config::load_file(Path::new(&p)).unwrap_or_else(|e| {
            eprintln!("{}", e);
            std::process::exit(1);
        }),
        None => config::load(),
    };

    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path, e);
        std::process::exit(1);
    });
    let script = parse_script(&text).unwrap_or_else(|e| {
        eprintln!("{}: {}", path, e);
        std::process::exit(1);
    });

    let last = script.last().and_then(|c| c.at).unwrap_or(0.0);
    let seconds = match flag("--seconds") {
        Some(s) => match s.parse::<f32>() {
            Ok(v) if (0.0..=MAX_TIME).contains(&v) => v,
            _ => {
                eprintln!("--seconds must be between 0 and {}, got {}", MAX_TIME, s);
                std::process::exit(1);
            }
        },
        None => (last + 1.0).min(MAX_TIME),
    };

    println!(
        "Voices: {}  Mode: {}  Tempo: {} BPM {}",
        config.max_voices,
        config.priority_mode.name(),
        config.bpm,
        config.step_division.name()
    );
    println!();

    let ctrl = Controller::new(config);
    let events = ctrl.render(&script, Duration::from_secs_f32(seconds));
    for r in &events {
        println!("{}", format_event(r));
    }
    println!();
    println!(
        "{} events, {} presses",
        events.len(),
        events.iter().filter(|r| r.event.is_voice_press()).count()
    );
}

fn format_event(r: &Rendered) -> String {
    let secs = r.at.as_micros() as f64 / 1_000_000.0;
    let part = match r.part {
        Part::Keys => "keys",
        Part::Drums => "drum",
    };
    let what = match r.event {
        NoteEvent::VoicePress { voice, note } => {
            format!("press    v{:<2} {:>3} vel {:.2}", voice, note.notenum, note.velocity)
        }
        NoteEvent::VoiceRelease { voice, note } => {
            format!("release  v{:<2} {:>3}", voice, note.notenum)
        }
        NoteEvent::KeyPress { keynum, note } => format!("key down k{:<2} {:>3}", keynum, note.notenum),
        NoteEvent::KeyRelease { keynum, notenum } => format!("key up   k{:<2} {:>3}", keynum, notenum),
        NoteEvent::Step { position: Some(p) } => format!("step     {}", p),
        NoteEvent::Step { position: None } => "step".to_string(),
    };
    format!("{:8.3}  {}  {}", secs, part, what)
}
