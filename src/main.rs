// Cue Player - plays promotional cues over desktop audio
// Runs until the process is killed; create the stop file to pause it.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use cue_player::{
    config::{ConfigStore, LogDestination, Settings},
    PulseAudio, RodioPlayer, Scheduler,
};

fn env_filter() -> EnvFilter {
    EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}

/// Install the subscriber for the configured destination
fn init_logging(settings: &Settings) -> Result<()> {
    match settings.log_destination {
        LogDestination::Console => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init();
        }
        LogDestination::File => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&settings.log_file)
                .with_context(|| {
                    format!("Failed to open log file {}", settings.log_file.display())
                })?;

            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
    }
    Ok(())
}

fn main() {
    let store = ConfigStore::beside_executable();

    // Logging is not up yet; problems here are reported again by the
    // scheduler's own config loads once it is.
    let settings = store.load();
    if let Err(e) = init_logging(&settings) {
        eprintln!("{e:#}, logging to the console instead");
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }

    tracing::info!(
        base_dir = %store.base_dir().display(),
        config = %store.path().display(),
        "Cue player starting"
    );

    if !PulseAudio::is_available() {
        tracing::warn!("pactl not found, no audio sessions will be detected");
    }

    Scheduler::new(store, PulseAudio::new(), RodioPlayer::new()).run()
}
