//! Sound generators for the virtual instruments.
//!
//! Every trigger becomes one [`Voice`]: an oscillator stack shaped by an
//! ADSR envelope for the synthesizer, a Karplus-Strong plucked string for the
//! guitar and bass, or a pre-rendered sample for the drum kit. Voices have a
//! fixed length because triggers carry no note-off; the mixer drops a voice
//! once it reports itself finished.

use crate::music::{note_to_frequency, DrumPad, Sound, SynthVoice};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::sync::Arc;

/// Seed for the drum kit noise, so every session renders the same kit.
const DRUM_KIT_SEED: u64 = 0x5eed_d0d0;

/// Fade applied to the tail of plucked strings to avoid a click.
const PLUCK_FADE_MS: f32 = 40.0;

fn ms_to_samples(ms: f32, sample_rate: u32) -> usize {
    (ms * sample_rate as f32 / 1000.0) as usize
}

/// Basic oscillator shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Saw,
    Triangle,
}

/// A phase-accumulating oscillator.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    /// Phase in cycles, [0, 1).
    phase: f32,
    /// Phase increment per sample (frequency / sample rate).
    step: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, sample_rate: u32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            step: frequency / sample_rate as f32,
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        let p = self.phase;
        let value = match self.waveform {
            Waveform::Sine => (p * TAU).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Saw => 2.0 * p - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
        };
        self.phase = (self.phase + self.step).fract();
        value
    }
}

/// Fixed-length ADSR envelope.
///
/// Phases, in order:
/// 1. Attack: ramps from 0.0 to peak (1.0)
/// 2. Decay: ramps from peak to the sustain level
/// 3. Hold: stays at the sustain level (stands in for a held key)
/// 4. Release: ramps from the sustain level to 0.0
///
/// Every phase lasts at least one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    attack: usize,
    decay: usize,
    sustain: f32,
    hold: usize,
    release: usize,
}

impl Envelope {
    /// Creates an envelope from durations in samples.
    pub fn new(attack: usize, decay: usize, sustain: f32, hold: usize, release: usize) -> Self {
        Self {
            attack: attack.max(1),
            decay: decay.max(1),
            sustain: sustain.clamp(0.0, 1.0),
            hold: hold.max(1),
            release: release.max(1),
        }
    }

    /// Creates an envelope from durations in milliseconds.
    pub fn from_millis(
        sample_rate: u32,
        attack_ms: f32,
        decay_ms: f32,
        sustain: f32,
        hold_ms: f32,
        release_ms: f32,
    ) -> Self {
        Self::new(
            ms_to_samples(attack_ms, sample_rate),
            ms_to_samples(decay_ms, sample_rate),
            sustain,
            ms_to_samples(hold_ms, sample_rate),
            ms_to_samples(release_ms, sample_rate),
        )
    }

    /// Total length of the envelope in samples.
    pub fn total_samples(&self) -> usize {
        self.attack + self.decay + self.hold + self.release
    }

    /// Amplitude at a sample position.
    pub fn amplitude_at(&self, position: usize) -> f32 {
        let mut pos = position;
        if pos < self.attack {
            return pos as f32 / self.attack as f32;
        }
        pos -= self.attack;
        if pos < self.decay {
            let t = pos as f32 / self.decay as f32;
            return 1.0 + (self.sustain - 1.0) * t;
        }
        pos -= self.decay;
        if pos < self.hold {
            return self.sustain;
        }
        pos -= self.hold;
        if pos < self.release {
            let t = pos as f32 / self.release as f32;
            return self.sustain * (1.0 - t);
        }
        0.0
    }
}

/// Oscillator stack under one envelope.
#[derive(Debug, Clone)]
pub struct ToneVoice {
    partials: Vec<(Oscillator, f32)>,
    envelope: Envelope,
    position: usize,
    gain: f32,
}

impl ToneVoice {
    /// Builds the synthesizer voice for a preset.
    pub fn synth(pitch: u8, voice: SynthVoice, sample_rate: u32) -> Self {
        let f = note_to_frequency(pitch);
        let osc = |waveform, freq| Oscillator::new(waveform, freq, sample_rate);
        let (partials, envelope, gain) = match voice {
            SynthVoice::Piano => (
                vec![
                    (osc(Waveform::Sine, f), 0.6),
                    (osc(Waveform::Triangle, f * 2.0), 0.25),
                    (osc(Waveform::Sine, f * 3.0), 0.1),
                ],
                Envelope::from_millis(sample_rate, 4.0, 350.0, 0.3, 250.0, 400.0),
                0.45,
            ),
            SynthVoice::Pad => (
                vec![
                    (osc(Waveform::Saw, f * 0.997), 0.3),
                    (osc(Waveform::Saw, f * 1.003), 0.3),
                    (osc(Waveform::Sine, f * 0.5), 0.25),
                ],
                Envelope::from_millis(sample_rate, 150.0, 200.0, 0.7, 600.0, 700.0),
                0.3,
            ),
            SynthVoice::Chiptune => (
                vec![(osc(Waveform::Square, f), 1.0)],
                Envelope::from_millis(sample_rate, 2.0, 60.0, 0.6, 150.0, 60.0),
                0.15,
            ),
        };
        Self {
            partials,
            envelope,
            position: 0,
            gain,
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        let mixed: f32 = self
            .partials
            .iter_mut()
            .map(|(osc, level)| osc.next_sample() * *level)
            .sum();
        let amp = self.envelope.amplitude_at(self.position);
        self.position += 1;
        mixed * amp * self.gain
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.envelope.total_samples()
    }
}

/// Karplus-Strong plucked string.
///
/// A noise-filled delay line one period long is fed back through a
/// two-point average, which decays high frequencies first the way a real
/// string does.
#[derive(Debug, Clone)]
pub struct PluckVoice {
    delay_line: Vec<f32>,
    index: usize,
    damping: f32,
    remaining: usize,
    fade: usize,
    /// Sine reinforcement of the fundamental (bass only).
    sub: Option<(Oscillator, f32)>,
    gain: f32,
}

impl PluckVoice {
    fn new<R: Rng>(
        rng: &mut R,
        pitch: u8,
        sample_rate: u32,
        damping: f32,
        ring_ms: f32,
        gain: f32,
    ) -> Self {
        let frequency = note_to_frequency(pitch);
        let period = ((sample_rate as f32 / frequency).round() as usize).max(2);
        let delay_line = (0..period).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Self {
            delay_line,
            index: 0,
            damping,
            remaining: ms_to_samples(ring_ms, sample_rate).max(1),
            fade: ms_to_samples(PLUCK_FADE_MS, sample_rate).max(1),
            sub: None,
            gain,
        }
    }

    /// A steel guitar string: bright and long-ringing.
    pub fn guitar<R: Rng>(rng: &mut R, pitch: u8, sample_rate: u32) -> Self {
        Self::new(rng, pitch, sample_rate, 0.996, 2000.0, 0.4)
    }

    /// A bass string: darker, shorter, with a sine under the fundamental.
    pub fn bass<R: Rng>(rng: &mut R, pitch: u8, sample_rate: u32) -> Self {
        let mut voice = Self::new(rng, pitch, sample_rate, 0.990, 1500.0, 0.45);
        voice.sub = Some((
            Oscillator::new(Waveform::Sine, note_to_frequency(pitch), sample_rate),
            0.35,
        ));
        voice
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.remaining == 0 {
            return 0.0;
        }
        let len = self.delay_line.len();
        let current = self.delay_line[self.index];
        let next = self.delay_line[(self.index + 1) % len];
        self.delay_line[self.index] = self.damping * 0.5 * (current + next);
        self.index = (self.index + 1) % len;

        let mut value = current;
        if let Some((osc, level)) = self.sub.as_mut() {
            // Follow the string's own decay so the sub never outlasts it
            value += osc.next_sample() * *level * next.abs().min(1.0);
        }

        let fade = (self.remaining as f32 / self.fade as f32).min(1.0);
        self.remaining -= 1;
        value * fade * self.gain
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}

/// Playback of a pre-rendered buffer.
#[derive(Debug, Clone)]
pub struct SamplePlayer {
    data: Arc<[f32]>,
    position: usize,
}

impl SamplePlayer {
    pub fn new(data: Arc<[f32]>) -> Self {
        Self { data, position: 0 }
    }

    pub fn next_sample(&mut self) -> f32 {
        let value = self.data.get(self.position).copied().unwrap_or(0.0);
        self.position += 1;
        value
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.data.len()
    }
}

/// One sounding note.
#[derive(Debug, Clone)]
pub enum Voice {
    Tone(ToneVoice),
    Pluck(PluckVoice),
    Sample(SamplePlayer),
}

impl Voice {
    /// Builds the voice for a sound.
    ///
    /// # Arguments
    ///
    /// * `sound` - What to play
    /// * `kit` - Pre-rendered drum samples
    /// * `sample_rate` - Output sample rate in Hz
    pub fn for_sound(sound: &Sound, kit: &DrumKit, sample_rate: u32) -> Self {
        match *sound {
            Sound::Drum { pad } => Voice::Sample(SamplePlayer::new(kit.sample(pad))),
            Sound::Synth { pitch, voice } => {
                Voice::Tone(ToneVoice::synth(pitch, voice, sample_rate))
            }
            Sound::Guitar { pitch } => {
                Voice::Pluck(PluckVoice::guitar(&mut rand::thread_rng(), pitch, sample_rate))
            }
            Sound::Bass { pitch } => {
                Voice::Pluck(PluckVoice::bass(&mut rand::thread_rng(), pitch, sample_rate))
            }
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        match self {
            Voice::Tone(v) => v.next_sample(),
            Voice::Pluck(v) => v.next_sample(),
            Voice::Sample(v) => v.next_sample(),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Voice::Tone(v) => v.is_finished(),
            Voice::Pluck(v) => v.is_finished(),
            Voice::Sample(v) => v.is_finished(),
        }
    }
}

/// Pre-rendered drum samples, one per pad.
#[derive(Debug, Clone)]
pub struct DrumKit {
    samples: Vec<Arc<[f32]>>,
}

impl DrumKit {
    /// Renders every pad of the kit.
    pub fn render(sample_rate: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(DRUM_KIT_SEED);
        let samples = DrumPad::ALL
            .iter()
            .map(|pad| Arc::from(render_pad(*pad, sample_rate, &mut rng)))
            .collect();
        Self { samples }
    }

    /// Returns the sample for a pad (cheap: shares the buffer).
    pub fn sample(&self, pad: DrumPad) -> Arc<[f32]> {
        Arc::clone(&self.samples[pad.index()])
    }
}

fn render_pad(pad: DrumPad, sample_rate: u32, rng: &mut StdRng) -> Vec<f32> {
    match pad {
        DrumPad::Kick => swept_sine(sample_rate, 400.0, 150.0, 50.0, 30.0, 8.0, 0.9),
        DrumPad::Snare => {
            let mut body = swept_sine(sample_rate, 250.0, 190.0, 180.0, 10.0, 30.0, 0.4);
            let noise = noise_burst(rng, sample_rate, 250.0, 20.0, 0.5);
            mix_into(&mut body, &noise);
            body
        }
        DrumPad::HiHat => noise_burst(rng, sample_rate, 80.0, 60.0, 0.35),
        DrumPad::OpenHat => noise_burst(rng, sample_rate, 450.0, 7.0, 0.3),
        DrumPad::Clap => {
            // Three quick bursts followed by a short tail
            let len = ms_to_samples(220.0, sample_rate);
            let mut out = vec![0.0; len];
            for start_ms in [0.0, 11.0, 23.0] {
                let offset = ms_to_samples(start_ms, sample_rate);
                let burst = noise_burst(rng, sample_rate, 200.0, 35.0, 0.35);
                for (dst, src) in out[offset.min(len)..].iter_mut().zip(burst.iter()) {
                    *dst += src;
                }
            }
            out
        }
        DrumPad::LowTom => swept_sine(sample_rate, 350.0, 130.0, 85.0, 12.0, 9.0, 0.7),
        DrumPad::HighTom => swept_sine(sample_rate, 300.0, 210.0, 150.0, 12.0, 10.0, 0.6),
        DrumPad::Crash => noise_burst(rng, sample_rate, 1500.0, 2.5, 0.3),
    }
}

/// Sine whose pitch glides exponentially from `start_hz` to `end_hz`.
fn swept_sine(
    sample_rate: u32,
    length_ms: f32,
    start_hz: f32,
    end_hz: f32,
    sweep_rate: f32,
    decay_rate: f32,
    level: f32,
) -> Vec<f32> {
    let len = ms_to_samples(length_ms, sample_rate);
    let dt = 1.0 / sample_rate as f32;
    let mut phase = 0.0f32;
    (0..len)
        .map(|n| {
            let t = n as f32 * dt;
            let freq = end_hz + (start_hz - end_hz) * (-t * sweep_rate).exp();
            phase = (phase + freq * dt).fract();
            (phase * TAU).sin() * (-t * decay_rate).exp() * level
        })
        .collect()
}

/// High-passed white noise with an exponential decay.
fn noise_burst(
    rng: &mut StdRng,
    sample_rate: u32,
    length_ms: f32,
    decay_rate: f32,
    level: f32,
) -> Vec<f32> {
    let len = ms_to_samples(length_ms, sample_rate);
    let dt = 1.0 / sample_rate as f32;
    let mut previous = 0.0f32;
    (0..len)
        .map(|n| {
            let white: f32 = rng.gen_range(-1.0..1.0);
            // First difference removes the low end
            let bright = 0.5 * (white - previous);
            previous = white;
            bright * (-(n as f32) * dt * decay_rate).exp() * level
        })
        .collect()
}

fn mix_into(dst: &mut Vec<f32>, src: &[f32]) {
    if dst.len() < src.len() {
        dst.resize(src.len(), 0.0);
    }
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}
