//! polykey - live note engine driven by line commands on stdin.
//!
//! Usage:
//!   polykey [--config polykey.toml] < commands.txt
//!
//! Timed lines wait until their offset from start; untimed lines apply
//! immediately. Voice events are logged (set `RUST_LOG=debug` for more).

use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use std::{env, io};

use pk_master::{config, parse_line, Controller};
use pk_output::LogBackend;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = match config_path {
        Some(path) => config::load_file(&path).unwrap_or_else(|e| {
            eprintln!("{}", e);
            std::process::exit(1);
        }),
        None => config::load(),
    };

    let mut ctl = Controller::new(config);
    ctl.start(Box::new(LogBackend::new()), Some(Box::new(LogBackend::new())));
    let start = Instant::now();

    for (i, line) in io::stdin().lock().lines().enumerate() {
        let Ok(line) = line else { break };
        let cmd = match parse_line(i + 1, &line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                log::error!("{}", e);
                continue;
            }
        };
        if let Some(at) = cmd.at {
            let due = start + Duration::from_secs_f32(at);
            std::thread::sleep(due.saturating_duration_since(Instant::now()));
        }
        ctl.send(cmd.command);
    }

    // let the last gate close before shutting down
    std::thread::sleep(Duration::from_millis(500));
    ctl.stop();
}
