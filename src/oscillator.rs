//! Phase accumulator sine oscillator.

use core::f64::consts::TAU;

use crate::note::Note;

/// Output level of a tone. Leaves headroom below full scale.
pub const GAIN: f64 = 0.7;

/// Sine oscillator writing interleaved frames with identical values on every channel.
///
/// The phase is never reset when the note changes, so switching pitch only
/// changes the slope of the waveform, not its position.
#[derive(Debug, Clone)]
pub struct Oscillator {
    sample_rate: f64,
    phase: f64,
    frequency: f64,
}

impl Oscillator {
    /// Creates an oscillator with phase 0 and no frequency yet.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            phase: 0.0,
            frequency: 0.0,
        }
    }

    /// Fills `out` with interleaved frames of `channels` samples each.
    ///
    /// - `Tone` writes `sin(phase) * GAIN` and advances the phase at that frequency.
    ///   A frequency that is not positive, not finite or not below the sample
    ///   rate is rendered as `Silence`.
    /// - `Silence` writes zeros but keeps the phase running at the last tone's
    ///   frequency, so a later tone picks up where the waveform would have been.
    /// - `Stop` writes zeros and leaves the phase alone.
    ///
    /// A trailing partial frame in `out` is not touched. Returns the number of
    /// frames written.
    pub fn render(&mut self, out: &mut [f32], channels: usize, note: Note) -> usize {
        if channels == 0 {
            return 0;
        }

        // Frames carry sound only for a playable tone.
        let sounding = match note {
            Note::Tone(frequency) => match self.playable(frequency) {
                Some(frequency) => {
                    self.frequency = frequency;
                    true
                }
                None => false,
            },
            Note::Silence => false,
            Note::Stop => {
                let frames = out.len() / channels;
                out[..frames * channels].fill(0.0);
                return frames;
            }
        };

        let increment = self.increment();
        let mut frames = 0;
        for frame in out.chunks_exact_mut(channels) {
            self.advance(increment);
            let value = if sounding {
                (self.phase.sin() * GAIN) as f32
            } else {
                0.0
            };
            frame.fill(value);
            frames += 1;
        }
        frames
    }

    // A tone must be positive, finite and below the sample rate, so one
    // subtraction always brings the phase back into range.
    fn playable(&self, frequency: f32) -> Option<f64> {
        Note::tone(frequency)
            .and_then(|note| note.frequency())
            .map(|frequency| frequency as f64)
            .filter(|frequency| *frequency < self.sample_rate)
    }

    fn increment(&self) -> f64 {
        TAU * self.frequency / self.sample_rate
    }

    // Wraps by subtraction only.
    fn advance(&mut self, increment: f64) {
        self.phase += increment;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
    }

    /// Current phase in radians, always in `[0, TAU)`.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Frequency of the last rendered tone, 0 before any tone.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Changes the sample rate, e.g. when the device runs at a different rate
    /// than requested. The phase is kept.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if sample_rate > 0.0 && sample_rate.is_finite() {
            self.sample_rate = sample_rate;
            if self.frequency >= sample_rate {
                self.frequency = 0.0;
            }
        }
    }
}
