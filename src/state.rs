//! State shared between the input thread and the audio callback.
//!
//! The sounding flag, the held key and the frequency are packed into a single
//! `AtomicU64`, so the audio callback gets a consistent view with one load and
//! never waits on the input side. Termination is a separate flag that only
//! ever goes from `false` to `true`.
//!
//! There must be a single writer. [`crate::input::Dispatcher`] funnels every
//! input source through one thread for that reason.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::note::{Key, Note, NoteTable};

const SOUNDING: u64 = 1 << 63;
const KEY_SHIFT: u32 = 32;
const KEY_MASK: u64 = 0x1F_FFFF;
const FREQUENCY_MASK: u64 = 0xFFFF_FFFF;

/// Result of applying an input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Idle to sounding.
    Started(f32),
    /// Sounding a different key.
    Changed(f32),
    /// Back to idle.
    Released,
    /// Termination was requested.
    StopRequested,
    /// Nothing changed: unmapped key, key repeat or stale release.
    Ignored,
}

/// Consistent view of the playback state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// Note to render.
    pub note: Note,
    /// Key currently held, `None` when idle.
    pub key: Option<Key>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Packed {
    sounding: bool,
    key: Key,
    frequency: f32,
}

impl Packed {
    fn encode(self) -> u64 {
        let mut bits = self.frequency.to_bits() as u64;
        bits |= (self.key as u64 & KEY_MASK) << KEY_SHIFT;
        if self.sounding {
            bits |= SOUNDING;
        }
        bits
    }

    fn decode(bits: u64) -> Self {
        Self {
            sounding: bits & SOUNDING != 0,
            key: char::from_u32(((bits >> KEY_SHIFT) & KEY_MASK) as u32).unwrap_or('\0'),
            frequency: f32::from_bits((bits & FREQUENCY_MASK) as u32),
        }
    }
}

/// What is sounding right now.
#[derive(Debug)]
pub struct PlaybackState {
    packed: AtomicU64,
    stopped: AtomicBool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackState {
    /// Creates an idle state.
    pub fn new() -> Self {
        let idle = Packed {
            sounding: false,
            key: '\0',
            frequency: 0.0,
        };
        Self {
            packed: AtomicU64::new(idle.encode()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Reads the current state without blocking.
    pub fn snapshot(&self) -> Snapshot {
        if self.is_stopped() {
            return Snapshot {
                note: Note::Stop,
                key: None,
            };
        }

        let packed = Packed::decode(self.packed.load(Ordering::Acquire));
        if packed.sounding {
            Snapshot {
                note: Note::Tone(packed.frequency),
                key: Some(packed.key),
            }
        } else {
            Snapshot {
                note: Note::Silence,
                key: None,
            }
        }
    }

    /// Frequency of the most recent tone, kept after release. 0 before any tone.
    pub fn last_frequency(&self) -> f32 {
        Packed::decode(self.packed.load(Ordering::Acquire)).frequency
    }

    /// Returns `true` once termination has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Requests termination.
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Applies a key press.
    ///
    /// Repeats of the held key are ignored so the note is not retriggered.
    pub fn key_down(&self, key: Key) -> Transition {
        let frequency = match NoteTable::lookup(key) {
            Some(Note::Tone(frequency)) => frequency,
            Some(Note::Stop) => {
                self.request_stop();
                return Transition::StopRequested;
            }
            _ => return Transition::Ignored,
        };

        let current = Packed::decode(self.packed.load(Ordering::Acquire));
        if current.sounding && current.key == key {
            return Transition::Ignored;
        }

        let next = Packed {
            sounding: true,
            key,
            frequency,
        };
        self.packed.store(next.encode(), Ordering::Release);

        if current.sounding {
            Transition::Changed(frequency)
        } else {
            Transition::Started(frequency)
        }
    }

    /// Applies a key release. Only the held key releases the note; anything
    /// else is a stale event and ignored.
    pub fn key_up(&self, key: Key) -> Transition {
        let current = Packed::decode(self.packed.load(Ordering::Acquire));
        if !current.sounding || current.key != key {
            return Transition::Ignored;
        }

        let next = Packed {
            sounding: false,
            ..current
        };
        self.packed.store(next.encode(), Ordering::Release);
        Transition::Released
    }
}
