//! Input sources and the thread applying their events to the playback state.

use std::{
    io::BufRead,
    sync::{Arc, mpsc},
};

use midir::{MidiInput, MidiInputConnection};

use crate::{
    error::ShellError,
    note::{Key, Note, NoteTable},
    state::{PlaybackState, Transition},
};

/// Discrete input event, consumed in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// A key was pressed. Also sent for key repeats.
    KeyDown(Key),
    /// A key was released.
    KeyUp(Key),
    /// The input source was closed.
    Quit,
}

/// Applies input events to the playback state.
///
/// This is the only writer of the state: every source sends its events
/// through the channel and they are applied here, one at a time.
pub struct Dispatcher {
    state: Arc<PlaybackState>,
    receiver: mpsc::Receiver<InputEvent>,
}

impl Dispatcher {
    /// Creates a dispatcher and the sender input sources feed it through.
    pub fn new(state: Arc<PlaybackState>) -> (Self, mpsc::Sender<InputEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { state, receiver }, sender)
    }

    /// Applies a single event.
    pub fn dispatch(&self, event: InputEvent) -> Transition {
        let transition = match event {
            InputEvent::KeyDown(key) => self.state.key_down(key),
            InputEvent::KeyUp(key) => self.state.key_up(key),
            InputEvent::Quit => {
                self.state.request_stop();
                Transition::StopRequested
            }
        };

        match transition {
            Transition::Started(frequency) | Transition::Changed(frequency) => {
                if let InputEvent::KeyDown(key) = event {
                    log::info!(
                        "Play {} ({} Hz)",
                        NoteTable::name(key).unwrap_or("?"),
                        frequency
                    );
                }
            }
            Transition::Released => {
                log::info!("Release ({} Hz)", self.state.last_frequency())
            }
            Transition::StopRequested => log::info!("Stop requested"),
            Transition::Ignored => log::debug!("Ignored {:?}", event),
        }

        transition
    }

    /// Waits for events and applies them until a stop is dispatched or all
    /// senders are gone. A vanished input also stops playback.
    pub fn run(self) {
        while let Ok(event) = self.receiver.recv() {
            if self.dispatch(event) == Transition::StopRequested {
                return;
            }
        }

        log::info!("All input sources closed");
        self.state.request_stop();
    }
}

/// MIDI note mapped to the first table key.
pub const MIDI_BASE_NOTE: u8 = 60;

/// Translates a raw MIDI message to an input event. Note-on for notes
/// 60..=72 presses the matching table key, note-off or note-on with velocity 0
/// releases it. Everything else is ignored.
pub fn midi_to_event(message: &[u8]) -> Option<InputEvent> {
    let [status, note, velocity, ..] = *message else {
        return None;
    };

    let key = note
        .checked_sub(MIDI_BASE_NOTE)
        .and_then(|offset| NoteTable::keys().nth(offset as usize))?;

    match status & 0xF0 {
        0x80 => Some(InputEvent::KeyUp(key)),
        0x90 if velocity == 0 => Some(InputEvent::KeyUp(key)),
        0x90 => Some(InputEvent::KeyDown(key)),
        _ => None,
    }
}

/// Vector of MIDI connections with an attached mpsc sender.
pub type MidiConnections = Vec<MidiInputConnection<mpsc::Sender<InputEvent>>>;

/// Connects all available MIDI inputs to `sender` and returns the connections,
/// which must be kept alive.
pub fn connect_midi(sender: mpsc::Sender<InputEvent>) -> Result<MidiConnections, ShellError> {
    let mut connections = MidiConnections::new();

    let input = MidiInput::new(&(env!("CARGO_PKG_NAME").to_owned() + " scan input"))
        .map_err(|err| ShellError::Midi(err.to_string()))?;

    for port in input.ports().iter() {
        let input = MidiInput::new(&(env!("CARGO_PKG_NAME").to_owned() + " input"))
            .map_err(|err| ShellError::Midi(err.to_string()))?;
        let port_name = match input.port_name(port) {
            Ok(name) => name,
            Err(err) => {
                log::warn!("Skipping MIDI input: {}", err);
                continue;
            }
        };
        log::info!("Connecting to MIDI input {}", port_name);
        let conn = input.connect(
            port,
            port_name.as_str(),
            |_timestamp, message, sender| {
                if let Some(event) = midi_to_event(message) {
                    sender.send(event).ok();
                }
            },
            sender.clone(),
        );
        match conn {
            Ok(conn) => connections.push(conn),
            Err(err) => log::warn!("Failed to connect to MIDI input {}: {}", port_name, err),
        }
    }

    Ok(connections)
}

/// Translates one line of terminal input.
///
/// Each character of a non-empty line presses that key. An empty line
/// releases `last`, the most recently pressed tone key.
pub fn line_to_events(line: &str, last: Option<Key>) -> Vec<InputEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return last.map(InputEvent::KeyUp).into_iter().collect();
    }

    line.chars()
        .filter(|c| !c.is_whitespace())
        .map(InputEvent::KeyDown)
        .collect()
}

/// Reads lines from `reader` until EOF, sending the resulting events. Sends
/// [`InputEvent::Quit`] at EOF.
pub fn read_terminal(reader: impl BufRead, sender: mpsc::Sender<InputEvent>) {
    let mut last = None;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::warn!("Terminal input error: {}", err);
                break;
            }
        };

        for event in line_to_events(&line, last) {
            // Only a key that starts a tone can be released later.
            match event {
                InputEvent::KeyDown(key) => {
                    if let Some(Note::Tone(_)) = NoteTable::lookup(key) {
                        last = Some(key);
                    }
                }
                _ => last = None,
            }
            if sender.send(event).is_err() {
                return;
            }
        }
    }

    sender.send(InputEvent::Quit).ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_transitions() {
        let state = Arc::new(PlaybackState::new());
        let (dispatcher, _sender) = Dispatcher::new(state.clone());

        assert_eq!(
            dispatcher.dispatch(InputEvent::KeyDown('a')),
            Transition::Started(261.63)
        );
        assert_eq!(
            dispatcher.dispatch(InputEvent::KeyDown('a')),
            Transition::Ignored
        );
        assert_eq!(
            dispatcher.dispatch(InputEvent::KeyDown('s')),
            Transition::Changed(293.66)
        );
        assert_eq!(dispatcher.dispatch(InputEvent::KeyUp('a')), Transition::Ignored);
        assert_eq!(state.snapshot().note, Note::Tone(293.66));
        assert_eq!(dispatcher.dispatch(InputEvent::KeyUp('s')), Transition::Released);
        assert_eq!(state.snapshot().note, Note::Silence);
    }

    #[test]
    fn test_run_returns_after_stop_key() {
        let state = Arc::new(PlaybackState::new());
        let (dispatcher, sender) = Dispatcher::new(state.clone());

        for event in [
            InputEvent::KeyDown('h'),
            InputEvent::KeyDown('q'),
            InputEvent::KeyDown('a'),
        ] {
            sender.send(event).unwrap();
        }

        dispatcher.run();
        assert!(state.is_stopped());
        assert_eq!(state.last_frequency(), 440.0);
    }

    #[test]
    fn test_run_stops_when_sources_close() {
        let state = Arc::new(PlaybackState::new());
        let (dispatcher, sender) = Dispatcher::new(state.clone());

        let handle = std::thread::spawn(move || dispatcher.run());
        sender.send(InputEvent::KeyDown('d')).unwrap();
        drop(sender);

        handle.join().unwrap();
        assert!(state.is_stopped());
    }

    #[test]
    fn test_midi_note_on_off() {
        assert_eq!(midi_to_event(&[0x90, 60, 100]), Some(InputEvent::KeyDown('a')));
        assert_eq!(midi_to_event(&[0x93, 69, 1]), Some(InputEvent::KeyDown('h')));
        assert_eq!(midi_to_event(&[0x90, 72, 64]), Some(InputEvent::KeyDown('k')));
        assert_eq!(midi_to_event(&[0x80, 61, 0]), Some(InputEvent::KeyUp('w')));
        assert_eq!(midi_to_event(&[0x90, 62, 0]), Some(InputEvent::KeyUp('s')));
    }

    #[test]
    fn test_midi_ignored_messages() {
        assert_eq!(midi_to_event(&[0x90, 59, 100]), None);
        assert_eq!(midi_to_event(&[0x90, 73, 100]), None);
        assert_eq!(midi_to_event(&[0xB0, 64, 127]), None);
        assert_eq!(midi_to_event(&[0xF8]), None);
        assert_eq!(midi_to_event(&[]), None);
    }

    #[test]
    fn test_terminal_lines() {
        assert_eq!(
            line_to_events("as", None),
            vec![InputEvent::KeyDown('a'), InputEvent::KeyDown('s')]
        );
        assert_eq!(line_to_events("", Some('s')), vec![InputEvent::KeyUp('s')]);
        assert_eq!(line_to_events("\r", None), vec![]);
        assert_eq!(line_to_events("q\n", None), vec![InputEvent::KeyDown('q')]);
    }

    #[test]
    fn test_empty_line_releases_after_unmapped_key() {
        let (sender, receiver) = mpsc::channel();
        read_terminal("az\n\n".as_bytes(), sender);

        let events: Vec<InputEvent> = receiver.iter().collect();
        assert_eq!(
            events,
            vec![
                InputEvent::KeyDown('a'),
                InputEvent::KeyDown('z'),
                InputEvent::KeyUp('a'),
                InputEvent::Quit,
            ]
        );

        let state = Arc::new(PlaybackState::new());
        let (dispatcher, _sender) = Dispatcher::new(state.clone());
        for event in &events[..3] {
            dispatcher.dispatch(*event);
        }
        assert_eq!(state.snapshot().note, Note::Silence);
    }

    #[test]
    fn test_read_terminal_ends_with_quit() {
        let (sender, receiver) = mpsc::channel();
        read_terminal("h\n\nk\n".as_bytes(), sender);

        let events: Vec<InputEvent> = receiver.iter().collect();
        assert_eq!(
            events,
            vec![
                InputEvent::KeyDown('h'),
                InputEvent::KeyUp('h'),
                InputEvent::KeyDown('k'),
                InputEvent::Quit,
            ]
        );
    }
}
