//! stagebox - command-line shell over the studio.
//!
//! # Usage
//!
//! ```bash
//! stagebox list                   # Saved songs, most recent first
//! stagebox demo                   # Record and save a short demo take
//! stagebox preview 1              # Play the first listed song
//! stagebox merge "Mix" 1 2        # Merge listed songs into a new one
//! stagebox delete 2               # Delete a listed song
//! ```
//!
//! `--config <path>` reads a JSON config; the default lives in the
//! platform data directory. Set `RUST_LOG=debug` for diagnostics.

use anyhow::{bail, Context, Result};
use stagebox::config::data_dir;
use stagebox::{
    init_logging, DrumPad, InstrumentKind, PreviewStatus, SongId, Sound, Studio, StudioConfig,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Command-line options for the application.
struct CliOptions {
    /// Config file location.
    config: Option<PathBuf>,
    /// Subcommand and its arguments.
    command: Vec<String>,
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut config = None;
        let mut command = Vec::new();
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    let Some(path) = args.get(i) else {
                        bail!("--config requires a path argument");
                    };
                    config = Some(PathBuf::from(path));
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                other => command.push(other.to_string()),
            }
            i += 1;
        }

        Ok(Self { config, command })
    }
}

fn print_help() {
    eprintln!("stagebox - record and replay instrument performances");
    eprintln!();
    eprintln!("Usage: stagebox [OPTIONS] <COMMAND>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  list                     List saved songs");
    eprintln!("  demo                     Record and save a demo take");
    eprintln!("  preview N                Preview song N");
    eprintln!("  merge TITLE N N...       Merge songs into a new one");
    eprintln!("  delete N                 Delete song N");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config PATH        Config file (JSON)");
    eprintln!("  -h, --help               Print this help message");
}

/// Maps a 1-based list position to a song ID.
fn song_at(studio: &Studio, arg: &str) -> Result<SongId> {
    let n: usize = arg
        .parse()
        .with_context(|| format!("Not a song number: {}", arg))?;
    let songs = studio.recorder().saved_songs();
    n.checked_sub(1)
        .and_then(|i| songs.get(i))
        .map(|s| s.id)
        .with_context(|| format!("No song number {}", n))
}

fn list(studio: &Studio) {
    let songs = studio.recorder().saved_songs();
    if songs.is_empty() {
        println!("No saved songs");
    }
    for (i, song) in songs.iter().enumerate() {
        println!(
            "{:>3}. {:<24} {:>2} tracks {:>5} events {:>6} ms",
            i + 1,
            song.title,
            song.track_count(),
            song.event_count(),
            song.duration_ms()
        );
    }
}

/// Plays a short guitar and drum phrase into a new take and saves it.
fn demo(studio: &mut Studio) -> Result<SongId> {
    studio.enter_instrument(InstrumentKind::Guitar);
    let start = Instant::now();
    let phrase = [
        (0, Some((5, 0)), None),
        (250, None, Some(DrumPad::HiHat)),
        (500, Some((4, 2)), Some(DrumPad::Snare)),
        (750, None, Some(DrumPad::HiHat)),
        (1000, Some((3, 2)), Some(DrumPad::Kick)),
    ];
    for (at_ms, string, pad) in phrase {
        let at = start + Duration::from_millis(at_ms);
        std::thread::sleep(at.saturating_duration_since(Instant::now()));
        if let Some((string, fret)) = string {
            studio.play_string(InstrumentKind::Guitar, string, fret);
        }
        if let Some(pad) = pad {
            studio.play_sound(Sound::Drum { pad });
        }
    }
    Ok(studio.save("Demo")?)
}

/// Previews a song until it finishes or times out.
fn preview(studio: &mut Studio, id: SongId) -> Result<()> {
    let tick = studio.recorder().scheduler_config().tick_interval();
    if !studio.preview(id, Instant::now())? {
        bail!("Song disappeared before preview");
    }
    loop {
        std::thread::sleep(tick);
        match studio.update(Instant::now()) {
            PreviewStatus::Playing { .. } => continue,
            _ => break,
        }
    }
    // Let the last voices ring out
    std::thread::sleep(Duration::from_millis(1500));
    Ok(())
}

fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    // Initialize logging (to stderr so it doesn't interfere with output)
    init_logging();

    let config_path = cli
        .config
        .unwrap_or_else(|| data_dir().join("config.json"));
    let config = StudioConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {:?}", config_path))?;
    let mut studio = Studio::open(&config)?;

    let args: Vec<&str> = cli.command.iter().map(String::as_str).collect();
    match args.as_slice() {
        [] | ["list"] => list(&studio),
        ["demo"] => {
            demo(&mut studio)?;
            list(&studio);
        }
        ["preview", n] => {
            let id = song_at(&studio, n)?;
            preview(&mut studio, id)?;
        }
        ["delete", n] => {
            let id = song_at(&studio, n)?;
            studio.delete(id)?;
        }
        ["merge", title, rest @ ..] => {
            let ids = rest
                .iter()
                .map(|n| song_at(&studio, n))
                .collect::<Result<Vec<_>>>()?;
            studio.merge(&ids, title)?;
            list(&studio);
        }
        other => {
            print_help();
            bail!("Unknown command: {}", other.join(" "));
        }
    }

    if let Some(status) = studio.status() {
        eprintln!("{}", status);
    }
    studio.shutdown();
    Ok(())
}
