#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod error;
pub mod input;
pub mod note;
pub mod oscillator;
pub mod render;
pub mod shell;
pub mod state;

pub use error::ShellError;
pub use input::{Dispatcher, InputEvent};
pub use note::{Key, Note, NoteTable, STOP_KEY};
pub use oscillator::{GAIN, Oscillator};
pub use render::{Chunk, RenderCallback, RenderStatus};
pub use shell::{Settings, SynthShell};
pub use state::{PlaybackState, Snapshot, Transition};

/// Default sampling frequency in Hz.
pub const SAMPLE_RATE: u32 = 44100;

/// Number of interleaved output channels. Every channel carries the same signal.
pub const CHANNELS: usize = 2;
