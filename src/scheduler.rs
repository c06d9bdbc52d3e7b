//! Lookahead scheduler for song previews.
//!
//! Playback runs on two clocks. The host calls [`PreviewScheduler::tick`]
//! every few tens of milliseconds from its control loop; each tick hands the
//! engine every event falling inside the next lookahead window, stamped with
//! its exact time on the engine's own clock. The engine then starts each
//! sound on the right frame regardless of how late or irregular the ticks
//! were. Every event is placed relative to a single origin captured when the
//! preview starts, so timing error does not accumulate over a song.

use crate::audio::SoundOutput;
use crate::config::SchedulerConfig;
use crate::error::EngineError;
use crate::music::{Song, SongId, Track};
use std::time::{Duration, Instant};

/// Result of a scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStatus {
    /// No preview is active.
    Idle,
    /// The preview is running; `dispatched` events were handed over this tick.
    Playing { dispatched: usize },
    /// Every event has been handed over and the song has reached its end.
    Finished,
    /// The preview hit the maximum preview length and was stopped.
    TimedOut,
}

/// A preview in progress.
#[derive(Debug)]
struct ActivePreview {
    song_id: SongId,
    tracks: Vec<Track>,
    /// Every event with an offset below this has been dispatched.
    dispatched_until_ms: u64,
    /// Control-clock instant the preview started at.
    started_at: Instant,
    /// Engine-clock time matching offset 0.
    engine_origin: Duration,
    /// Offset of the last event in the song.
    end_ms: u64,
}

impl ActivePreview {
    /// Dispatches every event in `[dispatched_until_ms, horizon_ms)`.
    ///
    /// A horizon that does not move forward dispatches nothing.
    fn dispatch<O: SoundOutput + ?Sized>(
        &mut self,
        output: &O,
        horizon_ms: u64,
    ) -> Result<usize, EngineError> {
        let from = self.dispatched_until_ms;
        let mut dispatched = 0;
        for track in &self.tracks {
            for event in track.events_in_range(from, horizon_ms) {
                let at = self.engine_origin + Duration::from_millis(event.offset_ms);
                output.play_at(event.sound, at)?;
                dispatched += 1;
            }
        }
        self.dispatched_until_ms = from.max(horizon_ms);
        Ok(dispatched)
    }

    fn is_exhausted(&self) -> bool {
        self.dispatched_until_ms > self.end_ms
    }
}

/// Schedules one song at a time onto a [`SoundOutput`].
#[derive(Debug)]
pub struct PreviewScheduler {
    config: SchedulerConfig,
    active: Option<ActivePreview>,
}

impl PreviewScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    /// Returns the scheduler settings.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Starts previewing a song, replacing any preview in progress.
    ///
    /// Nothing is dispatched until the next [`tick`](Self::tick).
    ///
    /// # Arguments
    ///
    /// * `song` - Song to play (copied; later changes to it are not seen)
    /// * `now` - Current control-clock time
    /// * `engine_origin` - Engine-clock time at which offset 0 should sound
    pub fn start(&mut self, song: &Song, now: Instant, engine_origin: Duration) {
        if let Some(previous) = self.active.take() {
            tracing::debug!("Preview of {} replaced", previous.song_id);
        }
        self.active = Some(ActivePreview {
            song_id: song.id,
            tracks: song.tracks().to_vec(),
            dispatched_until_ms: 0,
            started_at: now,
            engine_origin,
            end_ms: song.duration_ms(),
        });
        tracing::info!("Previewing \"{}\" ({})", song.title, song.id);
    }

    /// Stops the preview. Events already handed to the engine may still sound.
    ///
    /// # Returns
    ///
    /// true if a preview was active
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(preview) => {
                tracing::debug!("Preview of {} stopped", preview.song_id);
                true
            }
            None => false,
        }
    }

    /// Returns true while a preview is active.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Returns the ID of the song being previewed.
    pub fn song_id(&self) -> Option<SongId> {
        self.active.as_ref().map(|p| p.song_id)
    }

    /// Returns how far into the preview the control clock is.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.active
            .as_ref()
            .map(|p| now.saturating_duration_since(p.started_at))
    }

    /// Advances the preview to `now`.
    ///
    /// Hands the engine every event due before `now + lookahead` that has not
    /// been dispatched yet. Stops the preview once it is finished or has run
    /// for the maximum preview length; events at or past that limit never fire.
    ///
    /// # Errors
    ///
    /// Returns the engine error if a sound could not be scheduled; the
    /// preview is stopped in that case
    pub fn tick<O: SoundOutput + ?Sized>(
        &mut self,
        output: &O,
        now: Instant,
    ) -> Result<PreviewStatus, EngineError> {
        let Some(preview) = self.active.as_mut() else {
            return Ok(PreviewStatus::Idle);
        };

        let max = self.config.max_preview();
        let elapsed = now.saturating_duration_since(preview.started_at);
        if elapsed >= max {
            tracing::info!("Preview of {} reached the time limit", preview.song_id);
            self.active = None;
            return Ok(PreviewStatus::TimedOut);
        }

        let horizon = (elapsed + self.config.lookahead()).min(max);
        let dispatched = match preview.dispatch(output, horizon.as_millis() as u64) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Preview of {} aborted: {}", preview.song_id, e);
                self.active = None;
                return Err(e);
            }
        };

        if preview.is_exhausted() && elapsed.as_millis() as u64 >= preview.end_ms {
            tracing::debug!("Preview of {} finished", preview.song_id);
            self.active = None;
            return Ok(PreviewStatus::Finished);
        }
        Ok(PreviewStatus::Playing { dispatched })
    }
}
