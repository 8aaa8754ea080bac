//! Error types for the cue player
//!
//! Every collaborator gets its own thiserror enum. None of these are fatal to
//! the scheduler loop; they are logged and the cycle is skipped.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read or written
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The config file is not valid TOML for the settings table
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The settings could not be turned back into TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A setting holds a value that cannot be used
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Cue directory errors
#[derive(Error, Debug)]
pub enum CueError {
    /// The configured cue folder is not a directory
    #[error("Cue folder does not exist: {0}")]
    MissingDirectory(PathBuf),

    /// The cue folder exists but could not be listed
    #[error("Failed to list cue folder {path}: {source}")]
    ListError {
        /// Folder that was listed
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

/// Errors talking to the desktop audio server
#[derive(Error, Debug)]
pub enum SessionError {
    /// The helper program could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Program name
        program: &'static str,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The helper program ran and reported failure
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        /// Program name
        program: &'static str,
        /// Exit status
        status: std::process::ExitStatus,
        /// Trimmed standard error output
        stderr: String,
    },

    /// The session listing could not be parsed
    #[error("Malformed session listing: {0}")]
    Malformed(String),

    /// The session owned by this pid no longer exists
    #[error("Audio session {0} is gone")]
    Vanished(u32),
}

/// Errors during cue playback
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// No audio output device could be opened
    #[error("Failed to create output stream: {0}")]
    StreamError(String),

    /// The cue file could not be opened or decoded
    #[error("Failed to decode audio: {0}")]
    DecodeError(String),

    /// The cue file does not exist
    #[error("Sound file not found: {0}")]
    FileNotFound(PathBuf),

    /// Built without the `audio` feature
    #[error("Audio feature not enabled")]
    NotEnabled,
}

/// Result of config file operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
/// Result of audio server operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;
