//! Error types for the engine, the song library, and the recorder.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the synthesis engine.
///
/// All variants mean "no sound was produced"; none of them affect recording.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `initialize()` has not been called yet.
    #[error("audio engine not initialized")]
    NotInitialized,
    /// The output device could not be opened or has gone away.
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by the song library.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Reading or writing the backing file failed.
    #[error("library I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// JSON encoding or decoding failed.
    #[error("library JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Binary encoding or decoding failed.
    #[error("library binary format error: {0}")]
    Binary(#[from] bincode::Error),
    /// The file was written by an unknown format version.
    #[error("unsupported library version {0}")]
    UnsupportedVersion(u32),
}

/// Errors reported by the recorder.
///
/// Validation variants are rejected before any state changes.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The song title was empty or whitespace.
    #[error("song title must not be empty")]
    EmptyTitle,
    /// There is nothing captured to save.
    #[error("nothing has been recorded")]
    EmptyCapture,
    /// A merge needs at least two songs.
    #[error("merging needs at least two songs, got {0}")]
    NotEnoughSongs(usize),
    /// Previews are not allowed while a take is being recorded.
    #[error("cannot preview while recording")]
    CaptureInProgress,
    /// The engine could not play the preview.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The library could not persist the change.
    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl RecorderError {
    /// Returns true for input-validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RecorderError::EmptyTitle
                | RecorderError::EmptyCapture
                | RecorderError::NotEnoughSongs(_)
                | RecorderError::CaptureInProgress
        )
    }
}

/// Errors reported while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field parsed but holds an unusable value.
    #[error("invalid config value: {0}")]
    Invalid(String),
}
