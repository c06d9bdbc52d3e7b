//! Audio engine for real-time instrument playback.
//!
//! Sounds are rendered by a mixer source running on rodio's output thread.
//! The control thread never renders audio: it builds a voice, stamps it with
//! a start frame on the engine's own clock, and hands it to the mixer. That
//! clock is the number of frames the mixer has produced, so a sound scheduled
//! for a given time starts on exactly that frame no matter how late the
//! control thread got around to scheduling it.

use super::voice::{DrumKit, Voice};
use crate::config::AudioConfig;
use crate::error::EngineError;
use crate::music::{DrumPad, Sound, SynthVoice};
use rodio::{OutputStream, OutputStreamHandle, Source};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sample rate for audio synthesis (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Audio buffer size for low-latency playback.
/// Smaller = lower latency but higher CPU usage.
const BUFFER_SIZE: usize = 256;

/// Lifecycle of the audio output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// `initialize()` has not been called.
    Uninitialized,
    /// Output is open and sounds can be scheduled.
    Ready,
    /// Opening the output failed; `initialize()` may be retried.
    Unavailable,
}

/// Anything that can play sounds on a timeline of its own.
///
/// Times are durations since the output's clock started. `play_at` with a
/// time in the past plays as soon as possible.
pub trait SoundOutput {
    /// Returns the output's current time.
    fn current_time(&self) -> Result<Duration, EngineError>;

    /// Schedules a sound to start at an absolute time on the output's clock.
    fn play_at(&self, sound: Sound, at: Duration) -> Result<(), EngineError>;

    /// Plays a sound immediately.
    fn play(&self, sound: Sound) -> Result<(), EngineError> {
        let now = self.current_time()?;
        self.play_at(sound, now)
    }

    /// Hits a drum pad.
    fn trigger_drum(&self, pad: DrumPad) -> Result<(), EngineError> {
        self.play(Sound::Drum { pad })
    }

    /// Plays a synthesizer note with the given preset.
    fn trigger_synth(&self, pitch: u8, voice: SynthVoice) -> Result<(), EngineError> {
        self.play(Sound::Synth { pitch, voice })
    }

    /// Plucks a guitar string sounding the given pitch.
    fn trigger_guitar_string(&self, pitch: u8) -> Result<(), EngineError> {
        self.play(Sound::Guitar { pitch })
    }

    /// Plucks a bass string sounding the given pitch.
    fn trigger_bass_string(&self, pitch: u8) -> Result<(), EngineError> {
        self.play(Sound::Bass { pitch })
    }
}

/// A voice waiting for (or past) its start frame.
struct ScheduledVoice {
    start_frame: u64,
    voice: Voice,
}

/// Shared state between the control thread and the audio source.
/// Uses atomics for lock-free reads from the control thread.
struct SharedState {
    /// Frames produced so far; this is the engine clock.
    frames_rendered: AtomicU64,
    /// Voices handed over by the control thread.
    pending: Mutex<Vec<ScheduledVoice>>,
    /// Set to drop every sounding voice at the next block.
    clear_requested: AtomicBool,
    /// Master gain as f32 bits.
    master_gain: AtomicU32,
}

/// Audio source that mixes scheduled voices.
/// Implements rodio's Source trait for playback.
pub struct MixerSource {
    shared: Arc<SharedState>,
    /// Voices currently sounding.
    active: Vec<ScheduledVoice>,
    /// Mono output buffer.
    buf: Vec<f32>,
    /// Current position in the buffer.
    buf_pos: usize,
    /// Frame index of the next block.
    frame: u64,
    sample_rate: u32,
}

impl MixerSource {
    fn render_block(&mut self) {
        let block_start = self.frame;
        let block_end = block_start + BUFFER_SIZE as u64;

        if self.shared.clear_requested.swap(false, Ordering::AcqRel) {
            self.active.clear();
        }

        // Take every voice due within this block
        if let Ok(mut pending) = self.shared.pending.lock() {
            let mut i = 0;
            while i < pending.len() {
                if pending[i].start_frame < block_end {
                    self.active.push(pending.swap_remove(i));
                } else {
                    i += 1;
                }
            }
        }

        self.buf.fill(0.0);
        for scheduled in &mut self.active {
            // Late voices start at the top of the block
            let first = scheduled.start_frame.saturating_sub(block_start) as usize;
            for sample in &mut self.buf[first..] {
                if scheduled.voice.is_finished() {
                    break;
                }
                *sample += scheduled.voice.next_sample();
            }
        }
        self.active.retain(|s| !s.voice.is_finished());

        let gain = f32::from_bits(self.shared.master_gain.load(Ordering::Relaxed));
        for sample in &mut self.buf {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }

        self.frame = block_end;
        self.shared
            .frames_rendered
            .store(block_end, Ordering::Release);
        self.buf_pos = 0;
    }
}

impl Iterator for MixerSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.buf_pos >= BUFFER_SIZE {
            self.render_block();
        }
        let sample = self.buf[self.buf_pos];
        self.buf_pos += 1;
        Some(sample)
    }
}

impl Source for MixerSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Infinite stream
    }
}

/// Control-thread handle to a mixer source.
pub struct Mixer {
    shared: Arc<SharedState>,
    kit: DrumKit,
    sample_rate: u32,
}

impl Mixer {
    /// Creates a mixer and the source that renders it.
    ///
    /// The source must be handed to an output (or pulled by hand in tests);
    /// the mixer's clock only advances while the source is consumed.
    pub fn new(sample_rate: u32, master_gain: f32) -> (Self, MixerSource) {
        let shared = Arc::new(SharedState {
            frames_rendered: AtomicU64::new(0),
            pending: Mutex::new(Vec::new()),
            clear_requested: AtomicBool::new(false),
            master_gain: AtomicU32::new(master_gain.to_bits()),
        });
        let source = MixerSource {
            shared: Arc::clone(&shared),
            active: Vec::new(),
            buf: vec![0.0; BUFFER_SIZE],
            buf_pos: BUFFER_SIZE, // Start at end to trigger first render
            frame: 0,
            sample_rate,
        };
        let mixer = Self {
            shared,
            kit: DrumKit::render(sample_rate),
            sample_rate,
        };
        (mixer, source)
    }

    /// Sets the master gain applied before clipping.
    pub fn set_master_gain(&self, gain: f32) {
        self.shared
            .master_gain
            .store(gain.max(0.0).to_bits(), Ordering::Relaxed);
    }

    /// Drops every pending and sounding voice.
    pub fn silence(&self) {
        if let Ok(mut pending) = self.shared.pending.lock() {
            pending.clear();
        }
        self.shared.clear_requested.store(true, Ordering::Release);
    }

    /// Returns the number of voices not yet picked up by the source.
    pub fn pending_voices(&self) -> usize {
        self.shared.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn frames_to_time(&self, frames: u64) -> Duration {
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    fn time_to_frames(&self, time: Duration) -> u64 {
        (time.as_secs_f64() * self.sample_rate as f64).round() as u64
    }
}

impl SoundOutput for Mixer {
    fn current_time(&self) -> Result<Duration, EngineError> {
        Ok(self.frames_to_time(self.shared.frames_rendered.load(Ordering::Acquire)))
    }

    fn play_at(&self, sound: Sound, at: Duration) -> Result<(), EngineError> {
        let voice = Voice::for_sound(&sound, &self.kit, self.sample_rate);
        let scheduled = ScheduledVoice {
            start_frame: self.time_to_frames(at),
            voice,
        };
        let mut pending = self
            .shared
            .pending
            .lock()
            .map_err(|_| EngineError::Unavailable("mixer lock poisoned".to_string()))?;
        pending.push(scheduled);
        Ok(())
    }
}

/// The main audio engine for instrument playback.
///
/// Created closed; [`AudioEngine::initialize`] opens the output device and
/// must be called from a user interaction on platforms that gate audio.
pub struct AudioEngine {
    state: EngineState,
    sample_rate: u32,
    master_gain: f32,
    /// Mixer handle (present once ready).
    mixer: Option<Mixer>,
    /// Audio output stream (must be kept alive).
    _stream: Option<OutputStream>,
    /// Audio output handle for playback.
    _stream_handle: Option<OutputStreamHandle>,
}

impl AudioEngine {
    /// Creates an engine without touching the audio device.
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            state: EngineState::Uninitialized,
            sample_rate: config.sample_rate,
            master_gain: config.master_gain,
            mixer: None,
            _stream: None,
            _stream_handle: None,
        }
    }

    /// Opens the audio output. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unavailable`] if the output device cannot be
    /// opened; the engine stays usable for a later retry.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::Ready {
            return Ok(());
        }

        let (stream, stream_handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                self.state = EngineState::Unavailable;
                tracing::warn!("Failed to open audio output: {}", e);
                return Err(EngineError::Unavailable(e.to_string()));
            }
        };

        let (mixer, source) = Mixer::new(self.sample_rate, self.master_gain);
        if let Err(e) = stream_handle.play_raw(source) {
            self.state = EngineState::Unavailable;
            tracing::warn!("Failed to start audio playback: {}", e);
            return Err(EngineError::Unavailable(e.to_string()));
        }

        self.mixer = Some(mixer);
        self._stream = Some(stream);
        self._stream_handle = Some(stream_handle);
        self.state = EngineState::Ready;
        tracing::info!(sample_rate = self.sample_rate, "Audio engine ready");
        Ok(())
    }

    /// Returns the engine lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Returns whether sounds can currently be played.
    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    /// Sets the master output gain.
    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain;
        if let Some(mixer) = &self.mixer {
            mixer.set_master_gain(gain);
        }
    }

    /// Stops every sound immediately.
    pub fn silence(&self) {
        if let Some(mixer) = &self.mixer {
            mixer.silence();
        }
    }

    fn mixer(&self) -> Result<&Mixer, EngineError> {
        match (&self.mixer, self.state) {
            (Some(mixer), EngineState::Ready) => Ok(mixer),
            (_, EngineState::Unavailable) => Err(EngineError::Unavailable(
                "audio output failed to open".to_string(),
            )),
            _ => Err(EngineError::NotInitialized),
        }
    }
}

impl SoundOutput for AudioEngine {
    fn current_time(&self) -> Result<Duration, EngineError> {
        self.mixer()?.current_time()
    }

    fn play_at(&self, sound: Sound, at: Duration) -> Result<(), EngineError> {
        let mixer = self.mixer().inspect_err(|e| {
            tracing::warn!(?sound, "Dropping sound: {}", e);
        })?;
        mixer.play_at(sound, at)
    }
}
