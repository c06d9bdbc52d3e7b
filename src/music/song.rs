//! Saved songs.
//!
//! A song is a titled, timestamped collection of tracks produced by one
//! capture (or by merging other songs). Songs are immutable once saved.

use super::track::Track;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

/// Globally unique identifier for a saved song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SongId(Uuid);

impl SongId {
    /// Generates a new random song ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SongId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named, saved collection of tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Unique identifier, assigned at save time.
    pub id: SongId,

    /// User-supplied title (never empty).
    pub title: String,

    /// When the song was saved.
    pub date: SystemTime,

    /// Tracks in recording order.
    tracks: Vec<Track>,
}

impl Song {
    /// Creates a new song with a fresh ID and the current time.
    ///
    /// Callers are responsible for the title and content checks; the
    /// recorder only builds songs from non-empty captures.
    ///
    /// # Arguments
    ///
    /// * `title` - Song title
    /// * `tracks` - Tracks in recording order
    pub fn new(title: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            id: SongId::new(),
            title: title.into(),
            date: SystemTime::now(),
            tracks,
        }
    }

    /// Returns all tracks of the song.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Returns the number of tracks.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Returns the total number of events across all tracks.
    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(Track::event_count).sum()
    }

    /// Returns the offset of the latest event across all tracks.
    pub fn duration_ms(&self) -> u64 {
        self.tracks
            .iter()
            .map(Track::duration_ms)
            .max()
            .unwrap_or(0)
    }

    /// Serializes the song to JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Loads a song from JSON.
    ///
    /// # Errors
    ///
    /// Returns error if parsing fails
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::{DrumPad, EventKind, InstrumentKind, Sound, SynthVoice};

    fn demo_song() -> Song {
        let mut guitar = Track::new(InstrumentKind::Guitar);
        guitar.create_event(0, Sound::Guitar { pitch: 40 }, EventKind::Note);
        guitar.create_event(750, Sound::Guitar { pitch: 45 }, EventKind::Note);

        let mut drums = Track::new(InstrumentKind::Drum);
        drums.create_event(500, Sound::Drum { pad: DrumPad::Kick }, EventKind::Hit);

        let mut synth = Track::new(InstrumentKind::Synth);
        synth.create_event(
            1200,
            Sound::Synth {
                pitch: 72,
                voice: SynthVoice::Chiptune,
            },
            EventKind::Note,
        );

        Song::new("Demo", vec![guitar, drums, synth])
    }

    #[test]
    fn test_song_creation() {
        let song = demo_song();
        assert_eq!(song.title, "Demo");
        assert_eq!(song.track_count(), 3);
        assert_eq!(song.event_count(), 4);
        assert_eq!(song.duration_ms(), 1200);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(SongId::new(), SongId::new());
    }

    #[test]
    fn test_serialization() {
        let song = demo_song();
        let json = song.to_json().unwrap();
        let loaded = Song::from_json(&json).unwrap();
        assert_eq!(loaded, song);
    }
}
