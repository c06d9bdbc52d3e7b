//! Audio engine for instrument synthesis and playback.
//!
//! This module provides real-time sound generation with audio output via
//! rodio. It supports:
//! - Drum pads from a pre-rendered kit
//! - Synthesizer presets built from oscillators and envelopes
//! - Plucked guitar and bass strings
//! - Sample-accurate scheduling on the engine's own clock

pub mod engine;
pub mod voice;

pub use engine::{AudioEngine, EngineState, Mixer, MixerSource, SoundOutput, SAMPLE_RATE};

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sound output for tests.

    use super::SoundOutput;
    use crate::error::EngineError;
    use crate::music::Sound;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    /// Records every scheduled sound instead of playing it.
    #[derive(Default)]
    pub struct RecordingOutput {
        pub now: Cell<Duration>,
        pub unavailable: Cell<bool>,
        pub played: RefCell<Vec<(Sound, Duration)>>,
    }

    impl RecordingOutput {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sounds(&self) -> Vec<Sound> {
            self.played.borrow().iter().map(|(s, _)| *s).collect()
        }
    }

    impl SoundOutput for RecordingOutput {
        fn current_time(&self) -> Result<Duration, EngineError> {
            if self.unavailable.get() {
                return Err(EngineError::Unavailable("test output down".to_string()));
            }
            Ok(self.now.get())
        }

        fn play_at(&self, sound: Sound, at: Duration) -> Result<(), EngineError> {
            if self.unavailable.get() {
                return Err(EngineError::Unavailable("test output down".to_string()));
            }
            self.played.borrow_mut().push((sound, at));
            Ok(())
        }
    }
}
