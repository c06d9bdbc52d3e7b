//! Performance capture and song management.
//!
//! The recorder owns the take being recorded, the song library, and the
//! preview slot. A take moves through three states:
//!
//! - **Idle**: nothing is being recorded; logged events are dropped.
//! - **Armed**: a take is open but its clock has not started. The first
//!   logged event starts the clock, so the first note always sits at 0 ms.
//! - **Capturing**: events are stamped with the time since the first one.
//!
//! Saving or discarding the take returns to Idle. Only one preview plays at
//! a time, and recording always wins over previewing: arming or starting a
//! take stops the preview, and previews are refused while capturing.

use crate::audio::SoundOutput;
use crate::config::SchedulerConfig;
use crate::error::{EngineError, RecorderError};
use crate::library::SongLibrary;
use crate::music::{Event, EventKind, InstrumentKind, Song, SongId, Sound, Track};
use crate::scheduler::{PreviewScheduler, PreviewStatus};
use std::time::{Duration, Instant};

/// State of the current take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Armed,
    Capturing,
}

/// The take being recorded.
#[derive(Debug, Default)]
struct Capture {
    /// When the take's clock started; None while armed.
    started_at: Option<Instant>,
    /// One track per instrument, in order of first use.
    tracks: Vec<Track>,
}

impl Capture {
    fn with_tracks(tracks: Vec<Track>) -> Self {
        Self {
            started_at: None,
            tracks,
        }
    }

    /// Returns the track for an instrument, creating it on first use.
    fn track_mut(&mut self, instrument: InstrumentKind) -> &mut Track {
        let pos = match self.tracks.iter().position(|t| t.instrument == instrument) {
            Some(pos) => pos,
            None => {
                self.tracks.push(Track::new(instrument));
                self.tracks.len() - 1
            }
        };
        &mut self.tracks[pos]
    }

    fn event_count(&self) -> usize {
        self.tracks.iter().map(Track::event_count).sum()
    }
}

/// Records performances and manages saved songs.
#[derive(Debug)]
pub struct Recorder {
    library: SongLibrary,
    scheduler: PreviewScheduler,
    capture: Option<Capture>,
}

impl Recorder {
    /// Creates an idle recorder over a library.
    pub fn new(library: SongLibrary, scheduler: SchedulerConfig) -> Self {
        Self {
            library,
            scheduler: PreviewScheduler::new(scheduler),
            capture: None,
        }
    }

    // ==================== Capture ====================

    /// Returns the state of the current take.
    pub fn state(&self) -> CaptureState {
        match &self.capture {
            None => CaptureState::Idle,
            Some(c) if c.started_at.is_none() => CaptureState::Armed,
            Some(_) => CaptureState::Capturing,
        }
    }

    /// Opens a take whose clock starts at the first logged event.
    ///
    /// Call this when the user enters an instrument view. Keeps an already
    /// open take. Stops any preview.
    pub fn arm(&mut self) {
        self.stop_preview();
        if self.capture.is_none() {
            self.capture = Some(Capture::default());
            tracing::debug!("Capture armed");
        }
    }

    /// Starts the take's clock now, opening a take if needed.
    ///
    /// # Returns
    ///
    /// false if a take was already capturing (its clock is kept)
    pub fn start_capture(&mut self, now: Instant) -> bool {
        self.stop_preview();
        let capture = self.capture.get_or_insert_with(Capture::default);
        if capture.started_at.is_some() {
            return false;
        }
        capture.started_at = Some(now);
        tracing::debug!("Capture started");
        true
    }

    /// Throws the current take away and returns to idle.
    ///
    /// # Returns
    ///
    /// true if there was a take to discard
    pub fn discard_capture(&mut self) -> bool {
        let discarded = self.capture.take();
        if let Some(capture) = &discarded {
            tracing::debug!("Capture discarded ({} events)", capture.event_count());
        }
        discarded.is_some()
    }

    /// Logs an event at the current time. See [`Recorder::log_event_at`].
    pub fn log_event(&mut self, sound: Sound, kind: EventKind) -> bool {
        self.log_event_at(sound, kind, Instant::now())
    }

    /// Logs an event into the current take.
    ///
    /// The event lands on the track for its instrument, created on first use,
    /// at the time elapsed since the take's clock started. An armed take
    /// starts its clock here. Events logged while idle are dropped.
    ///
    /// # Arguments
    ///
    /// * `sound` - What was played
    /// * `kind` - How it was played
    /// * `now` - When it was played
    ///
    /// # Returns
    ///
    /// true if the event was recorded
    pub fn log_event_at(&mut self, sound: Sound, kind: EventKind, now: Instant) -> bool {
        let Some(capture) = self.capture.as_mut() else {
            tracing::trace!(?sound, "Dropping event, not recording");
            return false;
        };

        let first = capture.started_at.is_none();
        let started_at = *capture.started_at.get_or_insert(now);
        let offset_ms = now.saturating_duration_since(started_at).as_millis() as u64;
        capture
            .track_mut(sound.instrument())
            .add_event(Event::new(offset_ms, sound, kind));

        if first {
            self.scheduler.stop();
            tracing::debug!("Capture started by first event");
        }
        true
    }

    /// Returns the tracks of the current take (empty when idle).
    pub fn capture_tracks(&self) -> &[Track] {
        self.capture.as_ref().map(|c| c.tracks.as_slice()).unwrap_or(&[])
    }

    /// Returns how long the current take has been running.
    pub fn capture_elapsed(&self, now: Instant) -> Option<Duration> {
        self.capture
            .as_ref()
            .and_then(|c| c.started_at)
            .map(|start| now.saturating_duration_since(start))
    }

    // ==================== Library ====================

    /// Saves the current take as a new song and returns to idle.
    ///
    /// # Arguments
    ///
    /// * `title` - Song title; surrounding whitespace is trimmed
    ///
    /// # Errors
    ///
    /// - [`RecorderError::EmptyTitle`] if the title is blank
    /// - [`RecorderError::EmptyCapture`] if nothing was recorded
    /// - [`RecorderError::Library`] if the song could not be stored
    ///
    /// The take is kept on every error.
    pub fn save_song(&mut self, title: &str) -> Result<SongId, RecorderError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RecorderError::EmptyTitle);
        }
        let capture = match &self.capture {
            Some(c) if c.event_count() > 0 => c,
            _ => return Err(RecorderError::EmptyCapture),
        };

        let tracks = capture
            .tracks
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect();
        let song = Song::new(title, tracks);
        let (tracks, events) = (song.track_count(), song.event_count());
        let id = self.library.insert(song)?;

        self.capture = None;
        tracing::info!(
            "Saved \"{}\" ({}): {} tracks, {} events",
            title,
            id,
            tracks,
            events
        );
        Ok(id)
    }

    /// Returns all saved songs, most recently saved first.
    pub fn saved_songs(&self) -> Vec<&Song> {
        self.library.songs().collect()
    }

    /// Returns a saved song by its ID.
    pub fn song(&self, id: SongId) -> Option<&Song> {
        self.library.get(id)
    }

    /// Returns the underlying library.
    pub fn library(&self) -> &SongLibrary {
        &self.library
    }

    /// Replaces the current take with a copy of a song's tracks.
    ///
    /// The take is left armed: new events overlay the loaded tracks from 0 ms
    /// once playing starts, and saving writes a new song. The saved copy is
    /// never modified.
    pub fn load_song(&mut self, song: &Song) {
        self.stop_preview();
        if let Some(previous) = &self.capture {
            if previous.event_count() > 0 {
                tracing::debug!(
                    "Loading \"{}\" replaces {} unsaved events",
                    song.title,
                    previous.event_count()
                );
            }
        }
        self.capture = Some(Capture::with_tracks(song.tracks().to_vec()));
        tracing::info!("Loaded \"{}\" ({})", song.title, song.id);
    }

    /// Deletes a saved song permanently.
    ///
    /// # Returns
    ///
    /// true if the song existed; deleting a missing song is not an error
    ///
    /// # Errors
    ///
    /// Returns error if the library could not be written (the song is kept)
    pub fn delete_song(&mut self, id: SongId) -> Result<bool, RecorderError> {
        if self.scheduler.song_id() == Some(id) {
            self.scheduler.stop();
        }
        match self.library.remove(id)? {
            Some(song) => {
                tracing::info!("Deleted \"{}\" ({})", song.title, id);
                Ok(true)
            }
            None => {
                tracing::debug!("Delete of unknown song {}", id);
                Ok(false)
            }
        }
    }

    /// Merges songs into a new saved song.
    ///
    /// All tracks are overlaid from 0 ms, in input order, each exactly as it
    /// was recorded. The source songs are left in the library.
    ///
    /// # Errors
    ///
    /// - [`RecorderError::NotEnoughSongs`] for fewer than two songs
    /// - [`RecorderError::EmptyTitle`] if the title is blank
    /// - [`RecorderError::Library`] if the merged song could not be stored
    pub fn merge_songs(&mut self, songs: &[Song], title: &str) -> Result<SongId, RecorderError> {
        if songs.len() < 2 {
            return Err(RecorderError::NotEnoughSongs(songs.len()));
        }
        let title = title.trim();
        if title.is_empty() {
            return Err(RecorderError::EmptyTitle);
        }

        let tracks = songs
            .iter()
            .flat_map(|s| s.tracks().iter().cloned())
            .collect();
        let merged = Song::new(title, tracks);
        let track_count = merged.track_count();
        let id = self.library.insert(merged)?;
        tracing::info!(
            "Merged {} songs into \"{}\" ({}): {} tracks",
            songs.len(),
            title,
            id,
            track_count
        );
        Ok(id)
    }

    // ==================== Preview ====================

    /// Starts previewing a song, stopping any other preview first.
    ///
    /// The first lookahead window is dispatched immediately; call
    /// [`Recorder::update`] regularly afterwards.
    ///
    /// # Errors
    ///
    /// - [`RecorderError::CaptureInProgress`] while a take is capturing
    /// - [`RecorderError::Engine`] if the output cannot play
    pub fn preview_song<O: SoundOutput + ?Sized>(
        &mut self,
        song: &Song,
        output: &O,
        now: Instant,
    ) -> Result<(), RecorderError> {
        if self.state() == CaptureState::Capturing {
            return Err(RecorderError::CaptureInProgress);
        }
        self.scheduler.stop();
        let origin = output.current_time()?;
        self.scheduler.start(song, now, origin);
        self.scheduler.tick(output, now)?;
        Ok(())
    }

    /// Stops the preview, if any.
    ///
    /// # Returns
    ///
    /// true if a preview was playing
    pub fn stop_preview(&mut self) -> bool {
        self.scheduler.stop()
    }

    /// Returns the preview timing settings.
    pub fn scheduler_config(&self) -> &SchedulerConfig {
        self.scheduler.config()
    }

    /// Returns the ID of the song being previewed.
    pub fn previewing(&self) -> Option<SongId> {
        self.scheduler.song_id()
    }

    /// Advances the preview; call every `tick_interval_ms`.
    ///
    /// # Errors
    ///
    /// Returns the engine error that stopped the preview, if any
    pub fn update<O: SoundOutput + ?Sized>(
        &mut self,
        output: &O,
        now: Instant,
    ) -> Result<PreviewStatus, EngineError> {
        self.scheduler.tick(output, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::RecordingOutput;
    use crate::music::{DrumPad, SynthVoice};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn recorder() -> Recorder {
        Recorder::new(SongLibrary::in_memory(), SchedulerConfig::default())
    }

    fn guitar(pitch: u8) -> Sound {
        Sound::Guitar { pitch }
    }

    fn kick() -> Sound {
        Sound::Drum { pad: DrumPad::Kick }
    }

    /// Records two events per sound, one track per instrument, and saves the take.
    fn record_song(recorder: &mut Recorder, title: &str, sounds: &[Sound]) -> Song {
        let t0 = Instant::now();
        recorder.arm();
        for (i, sound) in sounds.iter().enumerate() {
            let kind = EventKind::for_sound(sound);
            let at = t0 + ms(i as u64 * 100);
            recorder.log_event_at(*sound, kind, at);
            recorder.log_event_at(*sound, kind, at + ms(50));
        }
        let id = recorder.save_song(title).unwrap();
        recorder.song(id).unwrap().clone()
    }

    #[test]
    fn test_idle_events_are_dropped() {
        let mut recorder = recorder();
        assert_eq!(recorder.state(), CaptureState::Idle);
        assert!(!recorder.log_event(guitar(40), EventKind::Note));
        assert!(recorder.capture_tracks().is_empty());
    }

    #[test]
    fn test_first_event_starts_clock() {
        let mut recorder = recorder();
        recorder.arm();
        assert_eq!(recorder.state(), CaptureState::Armed);

        let t0 = Instant::now() + ms(3_000);
        recorder.log_event_at(guitar(40), EventKind::Note, t0);
        assert_eq!(recorder.state(), CaptureState::Capturing);
        assert_eq!(recorder.capture_tracks()[0].events()[0].offset_ms, 0);
        assert_eq!(recorder.capture_elapsed(t0 + ms(10)), Some(ms(10)));
    }

    #[test]
    fn test_burst_keeps_call_order() {
        let mut recorder = recorder();
        let t0 = Instant::now();
        recorder.start_capture(t0);
        // Same instant, then increasing
        for pitch in 40..45 {
            recorder.log_event_at(guitar(pitch), EventKind::Note, t0 + ms(20));
        }
        for (i, pitch) in (45..50).enumerate() {
            recorder.log_event_at(guitar(pitch), EventKind::Note, t0 + ms(21 + i as u64));
        }

        let events = recorder.capture_tracks()[0].events();
        assert_eq!(events.len(), 10);
        assert!(events.windows(2).all(|w| w[0].offset_ms <= w[1].offset_ms));
        let pitches: Vec<_> = events.iter().filter_map(|e| e.sound.pitch()).collect();
        assert_eq!(pitches, (40..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_tracks_created_in_first_use_order() {
        let mut recorder = recorder();
        let t0 = Instant::now();
        recorder.start_capture(t0);
        recorder.log_event_at(kick(), EventKind::Hit, t0);
        recorder.log_event_at(Sound::Bass { pitch: 28 }, EventKind::Note, t0 + ms(5));
        recorder.log_event_at(kick(), EventKind::Hit, t0 + ms(10));

        let kinds: Vec<_> = recorder
            .capture_tracks()
            .iter()
            .map(|t| t.instrument)
            .collect();
        assert_eq!(kinds, vec![InstrumentKind::Drum, InstrumentKind::Bass]);
        assert_eq!(recorder.capture_tracks()[0].event_count(), 2);
    }

    #[test]
    fn test_demo_scenario() {
        let mut recorder = recorder();
        recorder.arm();
        let t0 = Instant::now();
        recorder.log_event_at(guitar(40), EventKind::Note, t0);
        recorder.log_event_at(kick(), EventKind::Hit, t0 + ms(500));
        recorder.save_song("Demo").unwrap();

        let songs = recorder.saved_songs();
        assert_eq!(songs.len(), 1);
        let demo = songs[0];
        assert_eq!(demo.title, "Demo");
        assert_eq!(demo.track_count(), 2);
        assert_eq!(demo.tracks()[0].instrument, InstrumentKind::Guitar);
        assert_eq!(demo.tracks()[0].events()[0].offset_ms, 0);
        assert_eq!(demo.tracks()[1].instrument, InstrumentKind::Drum);
        assert_eq!(demo.tracks()[1].events()[0].offset_ms, 500);
        assert_eq!(recorder.state(), CaptureState::Idle);
    }

    #[test]
    fn test_save_rejects_blank_titles() {
        let mut recorder = recorder();
        recorder.arm();
        recorder.log_event(guitar(40), EventKind::Note);

        for title in ["", "  ", "\t\n"] {
            assert!(matches!(
                recorder.save_song(title),
                Err(RecorderError::EmptyTitle)
            ));
        }
        assert!(recorder.saved_songs().is_empty());
        // The take survives the failed saves
        assert_eq!(recorder.state(), CaptureState::Capturing);

        let id = recorder.save_song(" Track 1 ").unwrap();
        assert_eq!(recorder.song(id).unwrap().title, "Track 1");
        assert_eq!(recorder.saved_songs().len(), 1);
    }

    #[test]
    fn test_save_rejects_empty_capture() {
        let mut recorder = recorder();
        let err = recorder.save_song("Nothing").unwrap_err();
        assert!(matches!(err, RecorderError::EmptyCapture));
        assert!(err.is_validation());

        recorder.arm();
        assert!(matches!(
            recorder.save_song("Still nothing"),
            Err(RecorderError::EmptyCapture)
        ));
        assert!(recorder.saved_songs().is_empty());
    }

    #[test]
    fn test_discard_capture() {
        let mut recorder = recorder();
        recorder.arm();
        recorder.log_event(guitar(40), EventKind::Note);
        assert!(recorder.discard_capture());
        assert_eq!(recorder.state(), CaptureState::Idle);
        assert!(!recorder.discard_capture());
    }

    #[test]
    fn test_load_then_resave_round_trips() {
        let mut recorder = recorder();
        let original = record_song(
            &mut recorder,
            "Original",
            &[
                guitar(40),
                kick(),
                Sound::Synth {
                    pitch: 60,
                    voice: SynthVoice::Pad,
                },
            ],
        );

        recorder.load_song(&original);
        assert_eq!(recorder.state(), CaptureState::Armed);
        let copy_id = recorder.save_song("Copy").unwrap();

        let copy = recorder.song(copy_id).unwrap();
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.tracks(), original.tracks());
        assert_eq!(recorder.song(original.id), Some(&original));
    }

    #[test]
    fn test_overdub_on_loaded_song() {
        let mut recorder = recorder();
        let original = record_song(&mut recorder, "Base", &[guitar(40)]);

        recorder.load_song(&original);
        let t0 = Instant::now();
        recorder.log_event_at(guitar(52), EventKind::Note, t0);
        recorder.log_event_at(kick(), EventKind::Hit, t0 + ms(20));

        let tracks = recorder.capture_tracks();
        assert_eq!(tracks.len(), 2);
        let offsets: Vec<_> = tracks[0].events().iter().map(|e| e.offset_ms).collect();
        assert_eq!(offsets, vec![0, 0, 50]);
        assert_eq!(recorder.song(original.id).unwrap().event_count(), 2);
    }

    #[test]
    fn test_merge_keeps_every_track() {
        let mut recorder = recorder();
        let a = record_song(&mut recorder, "A", &[guitar(40), kick()]);
        let b = record_song(
            &mut recorder,
            "B",
            &[
                Sound::Bass { pitch: 28 },
                Sound::Synth {
                    pitch: 72,
                    voice: SynthVoice::Chiptune,
                },
                Sound::Drum {
                    pad: DrumPad::Snare,
                },
            ],
        );
        assert_eq!(a.track_count(), 2);
        assert_eq!(b.track_count(), 3);

        let mix_id = recorder.merge_songs(&[a.clone(), b.clone()], "Mix").unwrap();
        let mix = recorder.song(mix_id).unwrap();
        assert_eq!(mix.title, "Mix");
        assert_eq!(mix.track_count(), 5);
        let expected: Vec<_> = a.tracks().iter().chain(b.tracks()).cloned().collect();
        assert_eq!(mix.tracks(), expected.as_slice());

        assert_eq!(recorder.song(a.id), Some(&a));
        assert_eq!(recorder.song(b.id), Some(&b));
        assert_eq!(recorder.saved_songs().len(), 3);

        // The merge is independent of its sources
        recorder.delete_song(a.id).unwrap();
        assert_eq!(recorder.song(mix_id).unwrap().track_count(), 5);
    }

    #[test]
    fn test_merge_validation() {
        let mut recorder = recorder();
        let a = record_song(&mut recorder, "A", &[guitar(40)]);
        let b = record_song(&mut recorder, "B", &[kick()]);

        assert!(matches!(
            recorder.merge_songs(&[a.clone()], "Solo"),
            Err(RecorderError::NotEnoughSongs(1))
        ));
        assert!(matches!(
            recorder.merge_songs(&[a, b], " "),
            Err(RecorderError::EmptyTitle)
        ));
        assert_eq!(recorder.saved_songs().len(), 2);
    }

    #[test]
    fn test_delete_twice() {
        let mut recorder = recorder();
        let song = record_song(&mut recorder, "Temp", &[kick()]);

        assert!(recorder.delete_song(song.id).unwrap());
        assert!(recorder.saved_songs().iter().all(|s| s.id != song.id));
        assert!(!recorder.delete_song(song.id).unwrap());
    }

    #[test]
    fn test_switching_previews() {
        let mut recorder = recorder();
        let a = record_song(&mut recorder, "A", &[guitar(40)]);
        let b = record_song(&mut recorder, "B", &[Sound::Bass { pitch: 28 }]);
        let output = RecordingOutput::new();
        let t0 = Instant::now();

        recorder.preview_song(&a, &output, t0).unwrap();
        assert_eq!(recorder.previewing(), Some(a.id));
        let from_a = output.played.borrow().len();
        assert_eq!(from_a, 2); // offsets 0 and 50 are inside the first window

        recorder.preview_song(&b, &output, t0).unwrap();
        assert_eq!(recorder.previewing(), Some(b.id));
        let mut now = t0;
        while recorder.previewing().is_some() {
            now += ms(25);
            recorder.update(&output, now).unwrap();
        }
        let after: Vec<_> = output.sounds().into_iter().skip(from_a).collect();
        assert_eq!(after, vec![Sound::Bass { pitch: 28 }; 2]);
    }

    #[test]
    fn test_recording_and_preview_exclude_each_other() {
        let mut recorder = recorder();
        let song = record_song(&mut recorder, "Song", &[guitar(40)]);
        let output = RecordingOutput::new();
        let t0 = Instant::now();

        // Arming stops a preview
        recorder.preview_song(&song, &output, t0).unwrap();
        recorder.arm();
        assert_eq!(recorder.previewing(), None);

        // Previewing while armed is fine; the first event stops it
        recorder.preview_song(&song, &output, t0).unwrap();
        recorder.log_event_at(kick(), EventKind::Hit, t0);
        assert_eq!(recorder.previewing(), None);

        // No previews while capturing
        assert!(matches!(
            recorder.preview_song(&song, &output, t0),
            Err(RecorderError::CaptureInProgress)
        ));
        assert_eq!(recorder.capture_tracks()[0].event_count(), 1);
    }

    #[test]
    fn test_deleting_previewed_song_stops_preview() {
        let mut recorder = recorder();
        let song = record_song(&mut recorder, "Song", &[guitar(40)]);
        let output = RecordingOutput::new();
        recorder.preview_song(&song, &output, Instant::now()).unwrap();

        recorder.delete_song(song.id).unwrap();
        assert_eq!(recorder.previewing(), None);
    }

    #[test]
    fn test_preview_with_engine_down() {
        let mut recorder = recorder();
        let song = record_song(&mut recorder, "Song", &[guitar(40)]);
        let output = RecordingOutput::new();
        output.unavailable.set(true);

        assert!(matches!(
            recorder.preview_song(&song, &output, Instant::now()),
            Err(RecorderError::Engine(EngineError::Unavailable(_)))
        ));
        assert_eq!(recorder.previewing(), None);
    }

    #[test]
    fn test_save_failure_keeps_take() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("songs");
        let library =
            SongLibrary::open(parent.join("lib.json"), crate::library::StoreFormat::Json).unwrap();
        let mut recorder = Recorder::new(library, SchedulerConfig::default());
        recorder.arm();
        recorder.log_event(guitar(40), EventKind::Note);

        std::fs::write(&parent, "").unwrap();
        assert!(matches!(
            recorder.save_song("Lost"),
            Err(RecorderError::Library(_))
        ));
        assert_eq!(recorder.state(), CaptureState::Capturing);
        assert_eq!(recorder.capture_tracks()[0].event_count(), 1);
    }
}
