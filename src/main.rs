//! Monophonic sine synthesizer played from the terminal or a MIDI keyboard.

use anyhow::{Context, Result, bail};
use sin_synth::{NoteTable, STOP_KEY, Settings, SynthShell};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = parse_args(std::env::args().skip(1))?;

    let keys: String = NoteTable::keys().collect();
    println!("Keys {keys} play C4 to C5, an empty line releases, {STOP_KEY} quits.");

    SynthShell::run(&settings).context("failed to start the synthesizer")?;
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Settings> {
    let mut settings = Settings::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-midi" => settings.midi = false,
            "--no-terminal" => settings.terminal = false,
            "--chunk" => {
                let value = args.next().context("--chunk needs a frame count")?;
                let frames: usize = value
                    .parse()
                    .with_context(|| format!("invalid frame count {value:?}"))?;
                settings.max_frames = Some(frames);
            }
            other => bail!("unknown argument {other:?}"),
        }
    }

    if !settings.midi && !settings.terminal {
        bail!("no input source enabled");
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_defaults() {
        let settings = parse_args(args(&[])).unwrap();
        assert!(settings.midi);
        assert!(settings.terminal);
        assert_eq!(settings.max_frames, None);
    }

    #[test]
    fn test_parse_flags() {
        let settings = parse_args(args(&["--no-midi", "--chunk", "256"])).unwrap();
        assert!(!settings.midi);
        assert_eq!(settings.max_frames, Some(256));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(args(&["--chunk"])).is_err());
        assert!(parse_args(args(&["--chunk", "many"])).is_err());
        assert!(parse_args(args(&["--loud"])).is_err());
        assert!(parse_args(args(&["--no-midi", "--no-terminal"])).is_err());
    }
}
