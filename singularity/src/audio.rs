//! Ambient soundscape: slowly wobbling drones over filtered noise
//!
//! [`AmbientMix`] synthesises the mono signal sample by sample. It is a plain
//! iterator, so it can be tested without an output device; [`SpeakerAmbience`]
//! hands it to `rodio` for playback.

use std::f32::consts::TAU;
use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;

/// Something that can start the ambient soundscape.
pub trait AmbientSource {
    fn start_ambient(&mut self);
}

pub const SAMPLE_RATE: u32 = 44_100;

/// Every drone's pitch wobbles at this rate...
const LFO_HZ: f32 = 0.05;
/// ...by this many hertz either side of its base frequency.
const LFO_DEPTH_HZ: f32 = 2.0;

/// Length of the looped white-noise buffer.
const NOISE_LOOP_SECONDS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    /// White noise through a low-pass at the voice's frequency.
    LowpassNoise,
}

/// One voice in the ambient mix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub waveform: Waveform,
    pub frequency_hz: f32,
    pub gain: f32,
}

pub const AMBIENT_VOICES: [Voice; 4] = [
    Voice {
        waveform: Waveform::Sine,
        frequency_hz: 55.0,
        gain: 0.15,
    },
    Voice {
        waveform: Waveform::Triangle,
        frequency_hz: 58.0,
        gain: 0.05,
    },
    Voice {
        waveform: Waveform::Sine,
        frequency_hz: 220.0,
        gain: 0.02,
    },
    Voice {
        waveform: Waveform::LowpassNoise,
        frequency_hz: 400.0,
        gain: 0.08,
    },
];

/// Oscillator in `[-1, 1]` at `phase` in `[0, 1)`.
fn oscillator(waveform: Waveform, phase: f32) -> f32 {
    match waveform {
        Waveform::Sine => (phase * TAU).sin(),
        Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        Waveform::LowpassNoise => 0.0,
    }
}

/// One-pole low-pass smoothing coefficient for `cutoff_hz`.
fn lowpass_coefficient(cutoff_hz: f32, sample_rate: u32) -> f32 {
    1.0 - (-TAU * cutoff_hz / sample_rate as f32).exp()
}

#[derive(Debug, Clone)]
struct VoiceState {
    voice: Voice,
    phase: f32,
    filtered: f32,
    coefficient: f32,
}

/// Endless mono mix of [`AMBIENT_VOICES`].
#[derive(Debug, Clone)]
pub struct AmbientMix {
    voices: Vec<VoiceState>,
    lfo_phase: f32,
    noise: Vec<f32>,
    noise_pos: usize,
    sample_rate: u32,
}

impl AmbientMix {
    pub fn new(voices: &[Voice], sample_rate: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise: Vec<f32> = (0..sample_rate * NOISE_LOOP_SECONDS)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        Self {
            voices: voices
                .iter()
                .map(|&voice| VoiceState {
                    voice,
                    phase: 0.0,
                    filtered: 0.0,
                    coefficient: lowpass_coefficient(voice.frequency_hz, sample_rate),
                })
                .collect(),
            lfo_phase: 0.0,
            noise,
            noise_pos: 0,
            sample_rate,
        }
    }

    /// Current pitch offset shared by the drones, in hertz.
    pub fn lfo_offset_hz(&self) -> f32 {
        (self.lfo_phase * TAU).sin() * LFO_DEPTH_HZ
    }

    fn next_sample(&mut self) -> f32 {
        let rate = self.sample_rate as f32;
        let wobble = self.lfo_offset_hz();
        let white = self.noise.get(self.noise_pos).copied().unwrap_or(0.0);

        let mut mix = 0.0;
        for state in &mut self.voices {
            let voice = state.voice;
            let value = match voice.waveform {
                Waveform::LowpassNoise => {
                    state.filtered += state.coefficient * (white - state.filtered);
                    state.filtered
                }
                waveform => {
                    let value = oscillator(waveform, state.phase);
                    state.phase = (state.phase + (voice.frequency_hz + wobble) / rate).fract();
                    value
                }
            };
            mix += value * voice.gain;
        }

        self.lfo_phase = (self.lfo_phase + LFO_HZ / rate).fract();
        if !self.noise.is_empty() {
            self.noise_pos = (self.noise_pos + 1) % self.noise.len();
        }
        mix
    }
}

impl Iterator for AmbientMix {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        Some(self.next_sample())
    }
}

impl rodio::Source for AmbientMix {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("cannot open output stream: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("cannot start playback: {0}")]
    Play(#[from] rodio::PlayError),
}

/// Plays [`AmbientMix`] on the default output device.
///
/// Without a usable device the scene carries on silently.
pub struct SpeakerAmbience {
    seed: u64,
    // The stream must outlive the sink or playback stops.
    output: Option<(rodio::OutputStream, rodio::Sink)>,
}

impl SpeakerAmbience {
    pub fn new(seed: u64) -> Self {
        Self { seed, output: None }
    }

    fn open(&self) -> Result<(rodio::OutputStream, rodio::Sink), AudioError> {
        let (stream, handle) = rodio::OutputStream::try_default()?;
        let sink = rodio::Sink::try_new(&handle)?;
        sink.append(AmbientMix::new(&AMBIENT_VOICES, SAMPLE_RATE, self.seed));
        Ok((stream, sink))
    }
}

impl AmbientSource for SpeakerAmbience {
    fn start_ambient(&mut self) {
        match self.open() {
            Ok(output) => {
                log::info!("Ambient audio playing ({} voices)", AMBIENT_VOICES.len());
                self.output = Some(output);
            }
            Err(e) => log::warn!("No audio output, continuing silently: {}", e),
        }
    }
}

/// Owns the source and makes sure it is started at most once.
#[derive(Debug, Default)]
pub struct AudioSystem<S: AmbientSource> {
    source: S,
    started: bool,
}

impl<S: AmbientSource> AudioSystem<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            started: false,
        }
    }

    /// Start the ambience on the first call. Returns whether this call did.
    pub fn trigger(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        log::info!("Starting ambient audio");
        self.source.start_ambient();
        true
    }
}
