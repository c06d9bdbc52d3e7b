//! Persistent song library.
//!
//! Songs are kept in the order they were added and stored as a single file,
//! either JSON (readable, the default) or bincode (compact). Every change is
//! written to a sibling temporary file and renamed over the library, so a
//! crash mid-write leaves the previous library intact. The in-memory list
//! only reflects a change once it is on disk.

use crate::error::LibraryError;
use crate::music::{Song, SongId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Current library file version.
const LIBRARY_VERSION: u32 = 1;

/// On-disk encoding of the library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// bincode.
    Binary,
}

impl StoreFormat {
    /// Conventional file extension for the format.
    pub fn extension(&self) -> &'static str {
        match self {
            StoreFormat::Json => "json",
            StoreFormat::Binary => "bin",
        }
    }
}

#[derive(Deserialize)]
struct LibraryFile {
    version: u32,
    songs: Vec<Song>,
}

#[derive(Serialize)]
struct LibraryFileRef<'a> {
    version: u32,
    songs: &'a [Song],
}

#[derive(Debug, Clone)]
struct Backing {
    path: PathBuf,
    format: StoreFormat,
}

/// The store of saved songs.
#[derive(Debug)]
pub struct SongLibrary {
    /// Where the library is written; None for an in-memory library.
    backing: Option<Backing>,
    /// Songs in insertion order.
    songs: Vec<Song>,
}

impl SongLibrary {
    /// Creates an empty library that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            backing: None,
            songs: Vec::new(),
        }
    }

    /// Opens a library file, starting empty if it does not exist yet.
    ///
    /// # Arguments
    ///
    /// * `path` - Library file location
    /// * `format` - Encoding of the file
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or decoded
    pub fn open<P: AsRef<Path>>(path: P, format: StoreFormat) -> Result<Self, LibraryError> {
        let path = path.as_ref().to_path_buf();
        let songs = match fs::read(&path) {
            Ok(data) => decode(&data, format)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No library at {:?}, starting empty", path);
                Vec::new()
            }
            Err(source) => return Err(LibraryError::Io { path, source }),
        };
        tracing::debug!("Opened library {:?} with {} songs", path, songs.len());
        Ok(Self {
            backing: Some(Backing { path, format }),
            songs,
        })
    }

    /// Returns the library file, if the library is persistent.
    pub fn path(&self) -> Option<&Path> {
        self.backing.as_ref().map(|b| b.path.as_path())
    }

    /// Returns all songs, most recently added first.
    pub fn songs(&self) -> impl Iterator<Item = &Song> {
        self.songs.iter().rev()
    }

    /// Returns a song by its ID.
    pub fn get(&self, id: SongId) -> Option<&Song> {
        self.songs.iter().find(|s| s.id == id)
    }

    /// Returns true if a song with this ID is stored.
    pub fn contains(&self, id: SongId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the number of stored songs.
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    /// Returns true if the library holds no songs.
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Adds a song and writes the library.
    ///
    /// # Errors
    ///
    /// Returns error if the library cannot be written; the song is not added
    pub fn insert(&mut self, song: Song) -> Result<SongId, LibraryError> {
        let id = song.id;
        self.songs.push(song);
        if let Err(e) = self.persist() {
            self.songs.pop();
            return Err(e);
        }
        Ok(id)
    }

    /// Removes a song and writes the library.
    ///
    /// # Returns
    ///
    /// The removed song, or None if no song had this ID
    ///
    /// # Errors
    ///
    /// Returns error if the library cannot be written; the song is kept
    pub fn remove(&mut self, id: SongId) -> Result<Option<Song>, LibraryError> {
        let Some(pos) = self.songs.iter().position(|s| s.id == id) else {
            return Ok(None);
        };
        let song = self.songs.remove(pos);
        if let Err(e) = self.persist() {
            self.songs.insert(pos, song);
            return Err(e);
        }
        Ok(Some(song))
    }

    /// Writes the current song list to the backing file, if any.
    fn persist(&self) -> Result<(), LibraryError> {
        let Some(backing) = &self.backing else {
            return Ok(());
        };
        let data = encode(&self.songs, backing.format)?;

        if let Some(parent) = backing.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LibraryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = temp_path(&backing.path);
        fs::write(&tmp, data).map_err(|source| LibraryError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &backing.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            LibraryError::Io {
                path: backing.path.clone(),
                source,
            }
        })?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn encode(songs: &[Song], format: StoreFormat) -> Result<Vec<u8>, LibraryError> {
    let file = LibraryFileRef {
        version: LIBRARY_VERSION,
        songs,
    };
    Ok(match format {
        StoreFormat::Json => serde_json::to_vec_pretty(&file)?,
        StoreFormat::Binary => bincode::serialize(&file)?,
    })
}

fn decode(data: &[u8], format: StoreFormat) -> Result<Vec<Song>, LibraryError> {
    let file: LibraryFile = match format {
        StoreFormat::Json => serde_json::from_slice(data)?,
        StoreFormat::Binary => bincode::deserialize(data)?,
    };
    if file.version != LIBRARY_VERSION {
        return Err(LibraryError::UnsupportedVersion(file.version));
    }
    Ok(file.songs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::{DrumPad, EventKind, InstrumentKind, Sound, SynthVoice, Track};

    fn song(title: &str) -> Song {
        let mut drums = Track::new(InstrumentKind::Drum);
        drums.create_event(0, Sound::Drum { pad: DrumPad::Kick }, EventKind::Hit);
        drums.create_event(250, Sound::Drum { pad: DrumPad::HiHat }, EventKind::Hit);
        let mut keys = Track::new(InstrumentKind::Synth);
        keys.create_event(
            125,
            Sound::Synth {
                pitch: 64,
                voice: SynthVoice::Piano,
            },
            EventKind::Note,
        );
        Song::new(title, vec![drums, keys])
    }

    #[test]
    fn test_songs_listed_most_recent_first() {
        let mut library = SongLibrary::in_memory();
        library.insert(song("First")).unwrap();
        library.insert(song("Second")).unwrap();
        library.insert(song("Third")).unwrap();

        let titles: Vec<_> = library.songs().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Third", "Second", "First"]);
        assert!(library.path().is_none());
    }

    #[test]
    fn test_remove_twice() {
        let mut library = SongLibrary::in_memory();
        let id = library.insert(song("Gone")).unwrap();

        assert!(library.remove(id).unwrap().is_some());
        assert!(!library.contains(id));
        assert!(library.remove(id).unwrap().is_none());
        assert!(library.is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        for format in [StoreFormat::Json, StoreFormat::Binary] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("nested").join(format!("lib.{}", format.extension()));

            let mut library = SongLibrary::open(&path, format).unwrap();
            assert!(library.is_empty());
            let kept = library.insert(song("Kept")).unwrap();
            let dropped = library.insert(song("Dropped")).unwrap();
            library.remove(dropped).unwrap();

            let reopened = SongLibrary::open(&path, format).unwrap();
            assert_eq!(reopened.len(), 1);
            assert_eq!(reopened.get(kept), library.get(kept));
            assert!(!path.with_file_name(format!("lib.{}.tmp", format.extension())).exists());
        }
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            SongLibrary::open(&path, StoreFormat::Json),
            Err(LibraryError::Json(_))
        ));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.json");
        fs::write(&path, r#"{ "version": 99, "songs": [] }"#).unwrap();
        assert!(matches!(
            SongLibrary::open(&path, StoreFormat::Json),
            Err(LibraryError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_hand_edited_offsets_are_reordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.json");
        let mut library = SongLibrary::open(&path, StoreFormat::Json).unwrap();
        let id = library.insert(song("Edited")).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["songs"][0]["tracks"][0]["events"]
            .as_array_mut()
            .unwrap()
            .reverse();
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        let reopened = SongLibrary::open(&path, StoreFormat::Json).unwrap();
        assert_eq!(reopened.get(id), library.get(id));
    }

    #[test]
    fn test_failed_write_leaves_library_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("songs");
        let mut library = SongLibrary::open(parent.join("lib.json"), StoreFormat::Json).unwrap();

        // A regular file where the library directory should be
        fs::write(&parent, "").unwrap();
        assert!(matches!(
            library.insert(song("Lost")),
            Err(LibraryError::Io { .. })
        ));
        assert!(library.is_empty());
    }
}
