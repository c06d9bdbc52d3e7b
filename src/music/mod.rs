//! Musical data structures for captured performances.
//!
//! This module provides the core types for representing what was played
//! (sounds and events), how it was grouped (tracks), and what gets stored
//! (songs), plus the pitch helpers the string instruments rely on.

mod event;
mod song;
mod sound;
mod track;

pub use event::{Event, EventKind};
pub use song::{Song, SongId};
pub use sound::{DrumPad, InstrumentKind, Sound, SynthVoice};
pub use track::Track;

/// Standard note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Highest fret the resolver accepts.
pub const MAX_FRET: u8 = 24;

/// Number of fretted positions shown per string (the open string is extra).
pub const FRET_COUNT: u8 = 5;

/// One string of a fretted instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringTuning {
    /// Open-string pitch as a MIDI note number.
    pub note: u8,
    /// Short label printed next to the string.
    pub label: &'static str,
}

/// Standard six-string guitar tuning, highest string first.
pub const GUITAR_TUNING: [StringTuning; 6] = [
    StringTuning { note: 64, label: "E" },
    StringTuning { note: 59, label: "B" },
    StringTuning { note: 55, label: "G" },
    StringTuning { note: 50, label: "D" },
    StringTuning { note: 45, label: "A" },
    StringTuning { note: 40, label: "E" },
];

/// Standard four-string bass tuning, highest string first.
pub const BASS_TUNING: [StringTuning; 4] = [
    StringTuning { note: 43, label: "G" },
    StringTuning { note: 38, label: "D" },
    StringTuning { note: 33, label: "A" },
    StringTuning { note: 28, label: "E" },
];

/// Resolves a fretted position to the pitch it sounds.
///
/// Each fret raises the open-string pitch by one semitone.
///
/// # Arguments
///
/// * `base` - Open-string pitch (MIDI note number)
/// * `fret` - Fret index, 0 for the open string, at most [`MAX_FRET`]
///
/// # Examples
///
/// ```
/// use stagebox::music::resolve;
///
/// // Low E string, 5th fret = A2
/// assert_eq!(resolve(40, 5), 45);
/// ```
pub fn resolve(base: u8, fret: u8) -> u8 {
    debug_assert!(fret <= MAX_FRET, "fret {} out of range", fret);
    base.saturating_add(fret).min(127)
}

/// Converts a MIDI note number to its frequency in Hz (A4 = 440 Hz).
pub fn note_to_frequency(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Arguments
///
/// * `note` - MIDI note number (0-127)
///
/// # Returns
///
/// String representation like "C4" or "F#5"
///
/// # Examples
///
/// ```
/// use stagebox::music::note_to_name;
///
/// let name = note_to_name(60); // Middle C
/// assert_eq!(name, "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Converts a note name to MIDI note number.
///
/// # Arguments
///
/// * `name` - Note name like "C4" or "F#5"
///
/// # Returns
///
/// MIDI note number (0-127) or None if invalid
pub fn name_to_note(name: &str) -> Option<u8> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    // Find where the octave number starts
    let octave_start = name.chars().position(|c| c.is_ascii_digit() || c == '-')?;

    let note_part = &name[..octave_start];
    let octave_part = &name[octave_start..];

    let note_index = NOTE_NAMES.iter().position(|&n| n == note_part)?;
    let octave: i8 = octave_part.parse().ok()?;

    // MIDI note = (octave + 1) * 12 + note_index
    let midi_note = (octave as i16 + 1) * 12 + note_index as i16;
    if (0..=127).contains(&midi_note) {
        Some(midi_note as u8)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_name() {
        assert_eq!(note_to_name(60), "C4");
        assert_eq!(note_to_name(69), "A4");
        assert_eq!(note_to_name(0), "C-1");
        assert_eq!(note_to_name(127), "G9");
    }

    #[test]
    fn test_name_to_note() {
        assert_eq!(name_to_note("C4"), Some(60));
        assert_eq!(name_to_note("A4"), Some(69));
        assert_eq!(name_to_note("C-1"), Some(0));
        assert_eq!(name_to_note("H4"), None);
        assert_eq!(name_to_note("G#9"), None); // 128
    }

    #[test]
    fn test_resolve_frets() {
        assert_eq!(resolve(40, 0), 40);
        assert_eq!(resolve(40, 5), 45);
        // B string, 5th fret lands on the open high E
        assert_eq!(resolve(GUITAR_TUNING[1].note, 5), GUITAR_TUNING[0].note);
        assert_eq!(note_to_name(resolve(BASS_TUNING[3].note, 3)), "G1");
    }

    #[test]
    fn test_tunings_are_named_consistently() {
        for string in GUITAR_TUNING.iter().chain(BASS_TUNING.iter()) {
            assert!(note_to_name(string.note).starts_with(string.label));
        }
    }

    #[test]
    fn test_note_to_frequency() {
        assert!((note_to_frequency(69) - 440.0).abs() < 1e-3);
        assert!((note_to_frequency(57) - 220.0).abs() < 1e-3);
        assert!((note_to_frequency(60) - 261.626).abs() < 1e-2);
    }
}
