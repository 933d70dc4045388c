//! Key to note mapping.

/// Identity of a key as delivered by an input source.
pub type Key = char;

/// What the render side should be doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Note {
    /// Sine tone at the given frequency in Hz.
    Tone(f32),
    /// No sound.
    Silence,
    /// Termination of the render loop was requested.
    Stop,
}

impl Note {
    /// Returns a tone for `frequency`, or `None` if it is not a positive finite value.
    pub fn tone(frequency: f32) -> Option<Self> {
        (frequency.is_finite() && frequency > 0.0).then_some(Note::Tone(frequency))
    }

    /// Frequency of a tone, `None` for the sentinels.
    pub fn frequency(&self) -> Option<f32> {
        match self {
            Note::Tone(frequency) => Some(*frequency),
            _ => None,
        }
    }
}

/// Key that requests termination.
pub const STOP_KEY: Key = 'q';

/// One octave starting at middle C, laid out over the home row (white keys)
/// and the row above it (black keys).
const TONES: [(Key, &str, f32); 13] = [
    ('a', "C4", 261.63),
    ('w', "Db4", 277.18),
    ('s', "D4", 293.66),
    ('e', "Eb4", 311.13),
    ('d', "E4", 329.63),
    ('f', "F4", 349.23),
    ('t', "Gb4", 369.99),
    ('g', "G4", 392.00),
    ('y', "Ab4", 415.30),
    ('h', "A4", 440.00),
    ('u', "Bb4", 466.16),
    ('j', "B4", 493.88),
    ('k', "C5", 523.25),
];

/// Fixed, stateless key table.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteTable;

impl NoteTable {
    /// Looks up the note for `key`. Unmapped keys return `None` and must leave
    /// the playback state alone.
    pub fn lookup(key: Key) -> Option<Note> {
        if key == STOP_KEY {
            return Some(Note::Stop);
        }

        TONES
            .iter()
            .find(|(k, _, _)| *k == key)
            .map(|(_, _, frequency)| Note::Tone(*frequency))
    }

    /// Note name of a tone key, e.g. `"A4"`.
    pub fn name(key: Key) -> Option<&'static str> {
        TONES.iter().find(|(k, _, _)| *k == key).map(|(_, name, _)| *name)
    }

    /// Tone keys in ascending pitch order.
    pub fn keys() -> impl Iterator<Item = Key> {
        TONES.iter().map(|(key, _, _)| *key)
    }
}
