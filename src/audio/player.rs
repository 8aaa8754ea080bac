//! Cue player implementation using rodio

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::{Decoder, OutputStream, Sink};
use tracing::{debug, error, info};

use super::CuePlayer;
use crate::error::PlaybackError;

/// Blocking cue player
///
/// The output stream is opened for each cue and dropped when the cue ends,
/// so the audio device is only held while something is playing.
#[derive(Debug, Default)]
pub struct RodioPlayer;

impl RodioPlayer {
    /// Create a player
    pub fn new() -> Self {
        Self
    }

    fn play_file(&self, path: &Path, volume: f32) -> Result<(), PlaybackError> {
        if !path.exists() {
            return Err(PlaybackError::FileNotFound(path.to_path_buf()));
        }

        let (_stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| PlaybackError::StreamError(e.to_string()))?;

        let file = File::open(path).map_err(|e| PlaybackError::DecodeError(e.to_string()))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| PlaybackError::DecodeError(e.to_string()))?;

        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| PlaybackError::StreamError(e.to_string()))?;

        sink.set_volume(volume.clamp(0.0, 1.0));
        sink.append(source);
        sink.sleep_until_end();

        debug!(path = %path.display(), "Output stream released");
        Ok(())
    }
}

impl CuePlayer for RodioPlayer {
    fn play(&mut self, path: &Path, volume: f32) -> Result<(), PlaybackError> {
        info!(
            path = %path.display(),
            volume = %format!("{:.0}%", volume * 100.0),
            "Playing cue"
        );

        match self.play_file(path, volume) {
            Ok(()) => {
                info!("Cue finished");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, path = %path.display(), "Cue playback failed");
                Err(e)
            }
        }
    }
}
