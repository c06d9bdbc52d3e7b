//! stagebox - capture and playback of live instrument performances.
//!
//! Instruments are played through a synthesized audio engine while every
//! trigger is logged into a take. Takes are saved as songs in a persistent
//! library, from which songs can be previewed, loaded for overdubbing,
//! merged, and deleted.

pub mod audio;
pub mod config;
pub mod error;
pub mod library;
pub mod music;
pub mod recorder;
pub mod scheduler;
pub mod studio;

// Re-export commonly used types
pub use audio::{AudioEngine, SoundOutput};
pub use config::StudioConfig;
pub use error::{ConfigError, EngineError, LibraryError, RecorderError};
pub use library::{SongLibrary, StoreFormat};
pub use music::{DrumPad, Event, EventKind, InstrumentKind, Song, SongId, Sound, SynthVoice, Track};
pub use recorder::{CaptureState, Recorder};
pub use scheduler::{PreviewScheduler, PreviewStatus};
pub use studio::Studio;

/// Installs the stderr log subscriber, filtered by `RUST_LOG`.
///
/// Does nothing if a subscriber is already installed.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
