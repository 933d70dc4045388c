//! Audio device and input wiring.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    time::{Duration, Instant},
};

use interflow::prelude::*;

use crate::{
    CHANNELS, SAMPLE_RATE,
    error::ShellError,
    input::{self, Dispatcher, InputEvent, MidiConnections},
    render::{RenderCallback, RenderStatus},
    state::PlaybackState,
};

/// Frames rendered per pass when no chunk size is configured.
const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// How long to wait for the audio callback to acknowledge a stop.
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Shell configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Sampling frequency in Hz. The rate reported by the device wins if it differs.
    pub sample_rate: u32,
    /// Number of interleaved channels rendered.
    pub channels: usize,
    /// Maximum number of frames rendered per pass, `None` for the default.
    pub max_frames: Option<usize>,
    /// Interval at which the main thread checks for termination.
    pub poll_interval: Duration,
    /// Connect all MIDI inputs.
    pub midi: bool,
    /// Read keys from the terminal.
    pub terminal: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            max_frames: None,
            poll_interval: Duration::from_millis(100),
            midi: true,
            terminal: true,
        }
    }
}

/// Runs the synthesizer: audio output, input sources and the dispatcher.
pub struct SynthShell;

impl SynthShell {
    /// Opens the default output device and the configured input sources, then
    /// blocks until a stop is requested and the audio callback has seen it.
    pub fn run(settings: &Settings) -> Result<(), ShellError> {
        let state = Arc::new(PlaybackState::new());
        let audio_stopped = Arc::new(AtomicBool::new(false));

        let (dispatcher, sender) = Dispatcher::new(state.clone());

        let midi_connections = open_inputs(settings, &sender)?;

        let callback = OutputCallback::new(settings, state.clone(), audio_stopped.clone());

        let device = default_output_device();
        log::info!("Using device {}", device.name());
        let stream = device
            .default_output_stream(callback)
            .map_err(|err| ShellError::Stream(format!("{err:?}")))?;

        if settings.terminal {
            let sender = sender.clone();
            std::thread::Builder::new()
                .name("terminal".into())
                .spawn(move || input::read_terminal(std::io::stdin().lock(), sender))
                .map_err(|err| ShellError::Thread(err.to_string()))?;
        }
        drop(sender);

        let input_thread = std::thread::Builder::new()
            .name("input".into())
            .spawn(move || dispatcher.run())
            .map_err(|err| ShellError::Thread(err.to_string()))?;

        let mut stop_seen_at = None;
        while !audio_stopped.load(Ordering::Acquire) {
            if state.is_stopped() {
                let since = *stop_seen_at.get_or_insert_with(Instant::now);
                if since.elapsed() > STOP_GRACE {
                    log::warn!("Audio callback did not acknowledge stop");
                    break;
                }
            }
            std::thread::sleep(settings.poll_interval);
        }

        if let Err(err) = stream.eject() {
            log::warn!("Failed to close audio stream: {:?}", err);
        }
        if input_thread.join().is_err() {
            log::warn!("Input thread panicked");
        }

        drop(midi_connections);
        log::info!("Stopped");
        Ok(())
    }
}

/// Connects MIDI if enabled. Fails when no input source would be left, so
/// the caller never starts rendering without a way to play or quit.
fn open_inputs(
    settings: &Settings,
    sender: &mpsc::Sender<InputEvent>,
) -> Result<MidiConnections, ShellError> {
    let connections = if settings.midi {
        match input::connect_midi(sender.clone()) {
            Ok(connections) => connections,
            Err(err) if settings.terminal => {
                log::warn!("MIDI input unavailable: {}", err);
                Vec::new()
            }
            Err(err) => return Err(err),
        }
    } else {
        Vec::new()
    };

    if !settings.terminal && connections.is_empty() {
        return Err(ShellError::Midi("no MIDI input connected".into()));
    }

    Ok(connections)
}

/// Adapts [`RenderCallback`] to the interflow output callback.
struct OutputCallback {
    render: RenderCallback,
    scratch: Vec<f32>,
    stopped: Arc<AtomicBool>,
}

impl OutputCallback {
    fn new(settings: &Settings, state: Arc<PlaybackState>, stopped: Arc<AtomicBool>) -> Self {
        let channels = settings.channels.max(1);
        let chunk_frames = settings.max_frames.unwrap_or(DEFAULT_CHUNK_FRAMES).max(1);

        Self {
            render: RenderCallback::new(state, settings.sample_rate, channels)
                .with_max_frames(Some(chunk_frames)),
            scratch: vec![0.0; chunk_frames * channels],
            stopped,
        }
    }

    /// Renders `num_frames` frames in passes of at most the scratch size and
    /// hands each mono value to `write` with its frame index. Frames left
    /// unrendered after a skip or a stop are written as silence.
    fn fill(&mut self, num_frames: usize, mut write: impl FnMut(usize, f32)) {
        let channels = self.render.channels();
        let mut position = 0;

        while position < num_frames {
            // Only render what the host asked for so the phase stays in step.
            let wanted = (num_frames - position).min(self.scratch.len() / channels);
            match self.render.render(Some(&mut self.scratch[..wanted * channels])) {
                RenderStatus::Rendered(chunk) => {
                    let frames = chunk.frames();
                    if frames == 0 {
                        break;
                    }
                    for i in 0..frames {
                        write(position + i, self.scratch[i * channels]);
                    }
                    position += frames;
                }
                RenderStatus::Skipped => break,
                RenderStatus::Stopped => {
                    self.stopped.store(true, Ordering::Release);
                    break;
                }
            }
        }

        for i in position..num_frames {
            write(i, 0.0);
        }
    }
}

impl AudioOutputCallback for OutputCallback {
    fn on_output_data(&mut self, context: AudioCallbackContext, mut output: AudioOutput<f32>) {
        let sample_rate = context.timestamp.samplerate as f64;
        if sample_rate != self.render.oscillator().sample_rate() {
            self.render.set_sample_rate(sample_rate);
        }

        let num_samples = output.buffer.num_samples();
        self.fill(num_samples, |i, value| output.buffer.set_mono(i, value));
    }
}
