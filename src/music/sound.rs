//! What an instrument can be asked to play.
//!
//! A [`Sound`] is the concrete payload of a trigger: a drum pad for the
//! percussion kit, or a pitch (plus voice for the synthesizer) for the
//! melodic instruments. Sounds are what the engine renders and what the
//! recorder stores inside each event.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The virtual instrument a sound belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Drum,
    Synth,
    Guitar,
    Bass,
}

impl InstrumentKind {
    /// All instrument kinds in menu order.
    pub const ALL: [InstrumentKind; 4] = [
        InstrumentKind::Drum,
        InstrumentKind::Synth,
        InstrumentKind::Guitar,
        InstrumentKind::Bass,
    ];

    /// Returns a display name for the instrument.
    pub fn name(&self) -> &'static str {
        match self {
            InstrumentKind::Drum => "Drums",
            InstrumentKind::Synth => "Synth",
            InstrumentKind::Guitar => "Guitar",
            InstrumentKind::Bass => "Bass",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pads of the drum kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrumPad {
    Kick,
    Snare,
    HiHat,
    OpenHat,
    Clap,
    LowTom,
    HighTom,
    Crash,
}

impl DrumPad {
    /// All pads, in the order they appear on the pad grid.
    pub const ALL: [DrumPad; 8] = [
        DrumPad::Kick,
        DrumPad::Snare,
        DrumPad::HiHat,
        DrumPad::OpenHat,
        DrumPad::Clap,
        DrumPad::LowTom,
        DrumPad::HighTom,
        DrumPad::Crash,
    ];

    /// Position of this pad in [`DrumPad::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Returns the pad label.
    pub fn name(&self) -> &'static str {
        match self {
            DrumPad::Kick => "Kick",
            DrumPad::Snare => "Snare",
            DrumPad::HiHat => "Hi-Hat",
            DrumPad::OpenHat => "Open Hat",
            DrumPad::Clap => "Clap",
            DrumPad::LowTom => "Low Tom",
            DrumPad::HighTom => "High Tom",
            DrumPad::Crash => "Crash",
        }
    }
}

/// Presets of the synthesizer keyboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthVoice {
    #[default]
    Piano,
    Pad,
    /// Square-wave "8-bit" lead.
    Chiptune,
}

/// A single playable sound.
///
/// Pitches are MIDI note numbers (0-127, 60 = Middle C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sound {
    Drum { pad: DrumPad },
    Synth { pitch: u8, voice: SynthVoice },
    Guitar { pitch: u8 },
    Bass { pitch: u8 },
}

impl Sound {
    /// Returns the instrument that produces this sound.
    pub fn instrument(&self) -> InstrumentKind {
        match self {
            Sound::Drum { .. } => InstrumentKind::Drum,
            Sound::Synth { .. } => InstrumentKind::Synth,
            Sound::Guitar { .. } => InstrumentKind::Guitar,
            Sound::Bass { .. } => InstrumentKind::Bass,
        }
    }

    /// Returns the pitch for melodic sounds, None for drum hits.
    pub fn pitch(&self) -> Option<u8> {
        match *self {
            Sound::Drum { .. } => None,
            Sound::Synth { pitch, .. } | Sound::Guitar { pitch } | Sound::Bass { pitch } => {
                Some(pitch)
            }
        }
    }
}
