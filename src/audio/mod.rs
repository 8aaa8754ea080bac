//! Cue playback
//!
//! Playback blocks the caller until the cue has finished. With the `audio`
//! feature the cue is decoded and played through rodio; without it a stub
//! player reports that audio is not available.

#[cfg(feature = "audio")]
mod player;

#[cfg(feature = "audio")]
pub use player::RodioPlayer;

#[cfg(not(feature = "audio"))]
mod stub;

#[cfg(not(feature = "audio"))]
pub use stub::RodioPlayer;

use std::path::Path;

use crate::error::PlaybackError;

/// Plays one cue file to completion
pub trait CuePlayer {
    /// Play `path` at `volume` (0.0 to 1.0), returning when playback ends
    ///
    /// The audio output is released before returning, on success and on
    /// failure alike.
    fn play(&mut self, path: &Path, volume: f32) -> Result<(), PlaybackError>;
}

impl<P: CuePlayer + ?Sized> CuePlayer for Box<P> {
    fn play(&mut self, path: &Path, volume: f32) -> Result<(), PlaybackError> {
        (**self).play(path, volume)
    }
}
