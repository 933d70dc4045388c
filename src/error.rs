//! Initialization errors.

use std::fmt;

/// Failure while setting up audio or input. Nothing has been rendered yet
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    /// The audio output stream could not be created.
    Stream(String),
    /// MIDI input could not be initialized.
    Midi(String),
    /// A worker thread could not be spawned.
    Thread(String),
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::Stream(msg) => write!(f, "audio stream error: {msg}"),
            ShellError::Midi(msg) => write!(f, "MIDI error: {msg}"),
            ShellError::Thread(msg) => write!(f, "thread error: {msg}"),
        }
    }
}

impl std::error::Error for ShellError {}
