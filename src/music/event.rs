//! Timestamped note events.
//!
//! An event is one trigger captured during a performance: the sound that was
//! played and when, in milliseconds from the start of the capture.

use super::sound::{InstrumentKind, Sound};
use serde::{Deserialize, Serialize};

/// How a sound was triggered.
///
/// Neither kind carries a duration: the instrument decides how long it rings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A pitched note (keys, strings).
    #[default]
    Note,
    /// A percussive hit (drum pads).
    Hit,
}

impl EventKind {
    /// Returns the natural kind for a sound.
    pub fn for_sound(sound: &Sound) -> Self {
        match sound.instrument() {
            InstrumentKind::Drum => EventKind::Hit,
            _ => EventKind::Note,
        }
    }
}

/// A single timestamped trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Offset in milliseconds from the start of the recording.
    pub offset_ms: u64,

    /// What was played.
    pub sound: Sound,

    /// How it was played.
    pub kind: EventKind,
}

impl Event {
    /// Creates a new event.
    ///
    /// # Examples
    ///
    /// ```
    /// use stagebox::music::{Event, EventKind, Sound};
    ///
    /// // Open low E on the guitar, half a second in
    /// let event = Event::new(500, Sound::Guitar { pitch: 40 }, EventKind::Note);
    /// assert_eq!(event.offset_ms, 500);
    /// ```
    pub fn new(offset_ms: u64, sound: Sound, kind: EventKind) -> Self {
        Self {
            offset_ms,
            sound,
            kind,
        }
    }

    /// Returns the instrument that produced this event.
    pub fn instrument(&self) -> InstrumentKind {
        self.sound.instrument()
    }
}
