//! Cue Player Library
//!
//! Plays short promotional audio cues at random intervals over whatever the
//! desktop is playing. While a cue sounds, the other applications are ducked
//! to a configured volume and restored afterwards. Cues are picked by weight
//! from a folder, and files can carry an expiry date in their name.

#![warn(missing_docs)]

pub mod audio;
pub mod config;
pub mod error;
pub mod cue;
pub mod scheduler;
pub mod session;

// Re-export commonly used types
pub use audio::{CuePlayer, RodioPlayer};
pub use config::{Config, ConfigStore, LogDestination, Settings};
pub use cue::{select_cue, select_cue_with, CueFile, CueLibrary, ExpiryStamp};
pub use error::{ConfigError, CueError, PlaybackError, SessionError};
pub use scheduler::{Phase, Scheduler, SchedulerState, SkipReason, TickOutcome, POLL_INTERVAL};
pub use session::{
    attenuate_all, restore_all, Attenuation, AudioSession, PulseAudio, RestoreSummary,
    SessionSource, VolumeSnapshot,
};
