//! Single-instrument tracks.
//!
//! A track holds the events one instrument produced during a capture, sorted
//! by offset. Events sharing an offset keep the order they were added in.

use super::event::{Event, EventKind};
use super::sound::{InstrumentKind, Sound};
use serde::{Deserialize, Serialize};

/// An ordered, single-instrument sequence of events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredTrack")]
pub struct Track {
    /// Instrument that produced the events.
    pub instrument: InstrumentKind,

    /// Events sorted by offset_ms; ties in insertion order.
    events: Vec<Event>,
}

/// Track as read from storage, before its events are known to be sorted.
#[derive(Deserialize)]
struct StoredTrack {
    instrument: InstrumentKind,
    events: Vec<Event>,
}

impl From<StoredTrack> for Track {
    fn from(stored: StoredTrack) -> Self {
        let mut events = stored.events;
        // Stable: equal offsets keep their stored order
        events.sort_by_key(|e| e.offset_ms);
        Self {
            instrument: stored.instrument,
            events,
        }
    }
}

impl Track {
    /// Creates an empty track for an instrument.
    pub fn new(instrument: InstrumentKind) -> Self {
        Self {
            instrument,
            events: Vec::new(),
        }
    }

    /// Adds an event, keeping the track sorted by offset.
    ///
    /// The event goes after every existing event with the same or an earlier
    /// offset, so appends during a live capture stay O(1) and simultaneous
    /// events keep their call order.
    ///
    /// # Arguments
    ///
    /// * `event` - The event to add; its instrument must match the track's
    pub fn add_event(&mut self, event: Event) {
        debug_assert_eq!(event.instrument(), self.instrument);
        // Fast path: live capture always appends at the end.
        if self
            .events
            .last()
            .is_none_or(|last| last.offset_ms <= event.offset_ms)
        {
            self.events.push(event);
            return;
        }
        let pos = self
            .events
            .partition_point(|e| e.offset_ms <= event.offset_ms);
        self.events.insert(pos, event);
    }

    /// Creates and adds a new event to the track.
    pub fn create_event(&mut self, offset_ms: u64, sound: Sound, kind: EventKind) {
        self.add_event(Event::new(offset_ms, sound, kind));
    }

    /// Returns all events in the track (sorted by offset_ms).
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Returns events starting within a given millisecond range.
    ///
    /// # Arguments
    ///
    /// * `start` - Start offset (inclusive)
    /// * `end` - End offset (exclusive)
    pub fn events_in_range(&self, start: u64, end: u64) -> &[Event] {
        let first = self.events.partition_point(|e| e.offset_ms < start);
        let last = self.events.partition_point(|e| e.offset_ms < end);
        &self.events[first..last.max(first)]
    }

    /// Returns the offset of the last event, 0 for an empty track.
    pub fn duration_ms(&self) -> u64 {
        self.events.last().map(|e| e.offset_ms).unwrap_or(0)
    }

    /// Returns the number of events in the track.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the track has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
