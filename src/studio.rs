//! Studio state tying the audio output to the recorder.
//!
//! A shell (terminal, GUI, test) drives the studio: every instrument trigger
//! both sounds on the output and lands in the current take, and `update()`
//! is called on a timer to keep previews flowing.

use crate::audio::{AudioEngine, SoundOutput};
use crate::config::StudioConfig;
use crate::error::RecorderError;
use crate::library::SongLibrary;
use crate::music::{
    resolve, DrumPad, EventKind, InstrumentKind, SongId, Sound, SynthVoice, BASS_TUNING,
    FRET_COUNT, GUITAR_TUNING,
};
use crate::recorder::Recorder;
use crate::scheduler::PreviewStatus;
use anyhow::{Context, Result};
use std::time::{Duration, Instant};

/// How long status messages stay visible.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// The performance studio.
pub struct Studio<O: SoundOutput = AudioEngine> {
    /// Where sounds are played.
    output: O,
    /// Take, library and preview state.
    recorder: Recorder,
    /// Status message to display.
    status_message: Option<(String, Instant)>,
}

impl Studio<AudioEngine> {
    /// Opens the song library and audio output described by `config`.
    ///
    /// A missing audio device is not fatal: the studio still records and
    /// manages songs, and [`Studio::initialize_audio`] can be retried.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration holds unusable values or the song
    /// library cannot be opened
    pub fn open(config: &StudioConfig) -> Result<Self> {
        config
            .validate()
            .context("Invalid studio configuration")?;
        let path = config.library.resolved_path();
        let library = SongLibrary::open(&path, config.library.format)
            .with_context(|| format!("Failed to open song library {:?}", path))?;

        let mut studio = Self::new(
            AudioEngine::new(&config.audio),
            Recorder::new(library, config.scheduler.clone()),
        );
        studio.initialize_audio();
        Ok(studio)
    }

    /// Opens the audio output if it is not open yet.
    ///
    /// # Returns
    ///
    /// true if the output is ready
    pub fn initialize_audio(&mut self) -> bool {
        match self.output.initialize() {
            Ok(()) => true,
            Err(e) => {
                self.set_status(format!("Audio unavailable: {}", e));
                false
            }
        }
    }

    /// Stops the preview and every sounding voice.
    pub fn shutdown(&mut self) {
        self.recorder.stop_preview();
        self.output.silence();
        tracing::info!("Studio shut down");
    }
}

impl<O: SoundOutput> Studio<O> {
    /// Creates a studio over an output and a recorder.
    pub fn new(output: O, recorder: Recorder) -> Self {
        Self {
            output,
            recorder,
            status_message: None,
        }
    }

    /// Returns the sound output.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Returns the recorder.
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Returns the recorder for direct song management.
    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    // ==================== Status ====================

    /// Sets a status message to display temporarily.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Returns the current status message.
    pub fn status(&self) -> Option<&str> {
        self.status_message.as_ref().map(|(m, _)| m.as_str())
    }

    /// Clears expired status messages.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }

    // ==================== Instruments ====================

    /// Arms a new take; call when an instrument view is opened.
    pub fn enter_instrument(&mut self, instrument: InstrumentKind) {
        self.recorder.arm();
        tracing::debug!("Entered {} view", instrument);
    }

    /// Plays a sound and logs it into the current take.
    ///
    /// Output failures are reported but do not stop the event from being
    /// recorded.
    ///
    /// # Returns
    ///
    /// true if the event was recorded
    pub fn play_sound_at(&mut self, sound: Sound, now: Instant) -> bool {
        if let Err(e) = self.output.play(sound) {
            self.set_status(format!("Audio: {}", e));
        }
        self.recorder
            .log_event_at(sound, EventKind::for_sound(&sound), now)
    }

    /// Plays a sound now. See [`Studio::play_sound_at`].
    pub fn play_sound(&mut self, sound: Sound) -> bool {
        self.play_sound_at(sound, Instant::now())
    }

    /// Hits a drum pad.
    pub fn play_drum(&mut self, pad: DrumPad) -> bool {
        self.play_sound(Sound::Drum { pad })
    }

    /// Plays a synthesizer key.
    pub fn play_synth(&mut self, pitch: u8, voice: SynthVoice) -> bool {
        self.play_sound(Sound::Synth { pitch, voice })
    }

    /// Plucks a guitar or bass string at a fret.
    ///
    /// # Arguments
    ///
    /// * `instrument` - Guitar or bass
    /// * `string` - String index, highest string first
    /// * `fret` - Fret number, 0 for the open string
    ///
    /// # Returns
    ///
    /// The sounded pitch, or None if the position is not on the fretboard
    pub fn play_string(&mut self, instrument: InstrumentKind, string: usize, fret: u8) -> Option<u8> {
        if fret > FRET_COUNT {
            return None;
        }
        let sound = match instrument {
            InstrumentKind::Guitar => Sound::Guitar {
                pitch: resolve(GUITAR_TUNING.get(string)?.note, fret),
            },
            InstrumentKind::Bass => Sound::Bass {
                pitch: resolve(BASS_TUNING.get(string)?.note, fret),
            },
            InstrumentKind::Drum | InstrumentKind::Synth => return None,
        };
        self.play_sound(sound);
        sound.pitch()
    }

    // ==================== Songs ====================

    /// Saves the current take.
    ///
    /// # Errors
    ///
    /// Returns the recorder's error; the take is kept
    pub fn save(&mut self, title: &str) -> Result<SongId, RecorderError> {
        let result = self.recorder.save_song(title);
        match &result {
            Ok(_) => self.set_status(format!("Saved \"{}\"", title.trim())),
            Err(e) => self.set_status(format!("Save failed: {}", e)),
        }
        result
    }

    /// Starts previewing a saved song.
    ///
    /// # Returns
    ///
    /// false if no song has this ID
    ///
    /// # Errors
    ///
    /// Returns error if a take is capturing or the output cannot play
    pub fn preview(&mut self, id: SongId, now: Instant) -> Result<bool, RecorderError> {
        let Some(song) = self.recorder.song(id).cloned() else {
            return Ok(false);
        };
        self.recorder.preview_song(&song, &self.output, now)?;
        self.set_status(format!("Previewing \"{}\"", song.title));
        Ok(true)
    }

    /// Deletes a saved song.
    ///
    /// # Errors
    ///
    /// Returns error if the library could not be written
    pub fn delete(&mut self, id: SongId) -> Result<bool, RecorderError> {
        let title = self.recorder.song(id).map(|s| s.title.clone());
        let removed = self.recorder.delete_song(id)?;
        if let Some(title) = title.filter(|_| removed) {
            self.set_status(format!("Deleted \"{}\"", title));
        }
        Ok(removed)
    }

    /// Merges saved songs into a new one.
    ///
    /// # Errors
    ///
    /// Returns error if fewer than two of the IDs are saved songs, the title
    /// is blank, or the library could not be written
    pub fn merge(&mut self, ids: &[SongId], title: &str) -> Result<SongId, RecorderError> {
        let songs: Vec<_> = ids
            .iter()
            .filter_map(|id| self.recorder.song(*id).cloned())
            .collect();
        let id = self.recorder.merge_songs(&songs, title)?;
        self.set_status(format!("Merged {} songs into \"{}\"", songs.len(), title.trim()));
        Ok(id)
    }

    /// Advances the preview; call every `tick_interval_ms`.
    pub fn update(&mut self, now: Instant) -> PreviewStatus {
        match self.recorder.update(&self.output, now) {
            Ok(PreviewStatus::Finished) => {
                self.set_status("Preview finished");
                PreviewStatus::Finished
            }
            Ok(PreviewStatus::TimedOut) => {
                self.set_status("Preview stopped (time limit)");
                PreviewStatus::TimedOut
            }
            Ok(status) => status,
            Err(e) => {
                self.set_status(format!("Preview stopped: {}", e));
                PreviewStatus::Idle
            }
        }
    }
}
