//! Audio callback body, independent of the audio backend.

use std::sync::Arc;

use crate::{note::Note, oscillator::Oscillator, state::PlaybackState};

/// Layout of a rendered chunk inside the host buffer, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Start of the data.
    pub offset: usize,
    /// Size of one frame.
    pub stride: usize,
    /// Total size of the data.
    pub size: usize,
}

impl Chunk {
    /// Number of frames in the chunk.
    pub fn frames(&self) -> usize {
        self.size.checked_div(self.stride).unwrap_or(0)
    }
}

/// Outcome of one callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Samples were written.
    Rendered(Chunk),
    /// No buffer this cycle; try again on the next one.
    Skipped,
    /// Termination was requested. The host loop should exit.
    Stopped,
}

/// Pulls the playback state once per invocation and renders it.
///
/// Never blocks and never allocates.
#[derive(Debug)]
pub struct RenderCallback {
    state: Arc<PlaybackState>,
    oscillator: Oscillator,
    channels: usize,
    max_frames: Option<usize>,
    stopped: bool,
}

impl RenderCallback {
    /// - `sample_rate` is the sampling frequency in Hz.
    /// - `channels` is the number of interleaved channels in the host buffer.
    pub fn new(state: Arc<PlaybackState>, sample_rate: u32, channels: usize) -> Self {
        Self {
            state,
            oscillator: Oscillator::new(sample_rate),
            channels,
            max_frames: None,
            stopped: false,
        }
    }

    /// Limits the number of frames rendered per invocation.
    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames.filter(|frames| *frames > 0);
        self
    }

    /// Renders into `buffer`, an interleaved `f32` buffer supplied by the host.
    /// `None` means the host had no buffer available.
    pub fn render(&mut self, buffer: Option<&mut [f32]>) -> RenderStatus {
        if self.stopped {
            return RenderStatus::Stopped;
        }

        let snapshot = self.state.snapshot();
        if snapshot.note == Note::Stop {
            self.stopped = true;
            return RenderStatus::Stopped;
        }

        let buffer = match buffer {
            Some(buffer) if self.channels > 0 && buffer.len() >= self.channels => buffer,
            _ => return RenderStatus::Skipped,
        };

        let mut frames = buffer.len() / self.channels;
        if let Some(max_frames) = self.max_frames {
            frames = frames.min(max_frames);
        }

        let frames = self.oscillator.render(
            &mut buffer[..frames * self.channels],
            self.channels,
            snapshot.note,
        );

        let stride = std::mem::size_of::<f32>() * self.channels;
        RenderStatus::Rendered(Chunk {
            offset: 0,
            stride,
            size: frames * stride,
        })
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The oscillator.
    pub fn oscillator(&self) -> &Oscillator {
        &self.oscillator
    }

    /// Follows a sample rate change reported by the host.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.oscillator.set_sample_rate(sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::oscillator::GAIN;

    fn callback() -> (Arc<PlaybackState>, RenderCallback) {
        let state = Arc::new(PlaybackState::new());
        let callback = RenderCallback::new(state.clone(), 44100, 2);
        (state, callback)
    }

    #[test]
    fn test_middle_c_stereo() {
        let (state, mut callback) = callback();
        state.key_down('a');

        let mut buffer = vec![0.0f32; 512 * 2];
        let status = callback.render(Some(&mut buffer[..]));
        assert_eq!(
            status,
            RenderStatus::Rendered(Chunk {
                offset: 0,
                stride: 8,
                size: 512 * 8
            })
        );

        for frame in buffer.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
            assert!(frame[0].abs() <= GAIN as f32);
        }

        // Period of 44100 / 261.63 = 168.56 frames: count upward zero crossings.
        let left: Vec<f32> = buffer.iter().step_by(2).copied().collect();
        let crossings: Vec<usize> = left
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0] < 0.0 && pair[1] >= 0.0)
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(crossings.len(), 3);
        for pair in crossings.windows(2) {
            let period = pair[1] - pair[0];
            assert!((168..=169).contains(&period), "period {period}");
        }
    }

    #[test]
    fn test_idle_renders_silence_and_keeps_phase() {
        let (_state, mut callback) = callback();

        let mut buffer = vec![1.0f32; 512 * 2];
        let status = callback.render(Some(&mut buffer[..]));
        assert!(matches!(status, RenderStatus::Rendered(chunk) if chunk.frames() == 512));
        assert!(buffer.iter().all(|s| *s == 0.0));
        assert_eq!(callback.oscillator().phase(), 0.0);
    }

    #[test]
    fn test_release_keeps_phase_running() {
        let (state, mut callback) = callback();
        let mut buffer = vec![0.0f32; 64 * 2];

        state.key_down('h');
        callback.render(Some(&mut buffer[..]));
        state.key_up('h');
        let before = callback.oscillator().phase();

        callback.render(Some(&mut buffer[..]));
        assert!(buffer.iter().all(|s| *s == 0.0));
        assert_ne!(callback.oscillator().phase(), before);
    }

    #[test]
    fn test_stop_key_ends_rendering() {
        let (state, mut callback) = callback();
        state.key_down('a');
        state.key_down('q');

        let mut buffer = vec![5.0f32; 64];
        assert_eq!(callback.render(Some(&mut buffer[..])), RenderStatus::Stopped);
        assert!(buffer.iter().all(|s| *s == 5.0));

        assert_eq!(callback.render(Some(&mut buffer[..])), RenderStatus::Stopped);
        assert_eq!(callback.render(None), RenderStatus::Stopped);
        assert!(buffer.iter().all(|s| *s == 5.0));
    }

    #[test]
    fn test_missing_buffer_is_skipped() {
        let (state, mut callback) = callback();
        state.key_down('a');

        assert_eq!(callback.render(None), RenderStatus::Skipped);
        assert_eq!(callback.render(Some(&mut [0.0f32; 0][..])), RenderStatus::Skipped);
        assert_eq!(callback.oscillator().phase(), 0.0);

        let mut buffer = vec![0.0f32; 8];
        assert!(matches!(
            callback.render(Some(&mut buffer[..])),
            RenderStatus::Rendered(_)
        ));
    }

    #[test]
    fn test_max_frames_limits_chunk() {
        let state = Arc::new(PlaybackState::new());
        let mut callback = RenderCallback::new(state.clone(), 44100, 2).with_max_frames(Some(32));
        state.key_down('a');

        let mut buffer = vec![3.0f32; 128 * 2];
        let status = callback.render(Some(&mut buffer[..]));
        assert_eq!(
            status,
            RenderStatus::Rendered(Chunk {
                offset: 0,
                stride: 8,
                size: 32 * 8
            })
        );
        assert!(buffer[64..].iter().all(|s| *s == 3.0));
    }

    #[test]
    fn test_chunked_rendering_is_continuous() {
        let state = Arc::new(PlaybackState::new());
        state.key_down('e');

        let mut chunked = RenderCallback::new(state.clone(), 44100, 2).with_max_frames(Some(100));
        let mut whole = RenderCallback::new(state.clone(), 44100, 2);

        let mut expected = vec![0.0f32; 300 * 2];
        whole.render(Some(&mut expected[..]));

        let mut actual = Vec::new();
        let mut buffer = vec![0.0f32; 300 * 2];
        for _ in 0..3 {
            if let RenderStatus::Rendered(chunk) = chunked.render(Some(&mut buffer[..])) {
                actual.extend_from_slice(&buffer[..chunk.frames() * 2]);
            }
        }
        assert_eq!(actual, expected);
    }
}
