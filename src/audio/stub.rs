//! Stub implementation when audio feature is disabled

use std::path::Path;

use tracing::warn;

use super::CuePlayer;
use crate::error::PlaybackError;

/// Stub player (reports failure when audio feature is disabled)
#[derive(Debug, Default)]
pub struct RodioPlayer;

impl RodioPlayer {
    /// Create a player
    pub fn new() -> Self {
        Self
    }
}

impl CuePlayer for RodioPlayer {
    fn play(&mut self, path: &Path, _volume: f32) -> Result<(), PlaybackError> {
        warn!(
            path = %path.display(),
            "Cue playback skipped, built without the audio feature"
        );
        Err(PlaybackError::NotEnabled)
    }
}
