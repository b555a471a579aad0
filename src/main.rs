//! drumscore - command line front end for drum scores.
//!
//! Converts saved drum grids to MusicXML or MIDI and inspects the results.
//!
//! # Usage
//!
//! ```bash
//! drumscore xml score.json -o score.musicxml
//! drumscore midi score.json --bpm 96 -o score.mid
//! drumscore decode score.musicxml
//! drumscore inspect score.mid
//! drumscore preset shuffle --measures 4 -o shuffle.json
//! ```
//!
//! Set `RUST_LOG=debug` for conversion summaries on stderr.

use anyhow::{bail, Context, Result};
use drumscore::grid::{Pattern, Preset, DEFAULT_BPM, DEFAULT_MEASURES};
use drumscore::midi::{build_midi_from_musicxml, import_midi_file, parse_midi_notes_from_musicxml};
use drumscore::notation::build_musicxml;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// What the invocation asks for.
#[derive(Debug)]
enum Command {
    /// Snapshot JSON to MusicXML.
    Xml { input: PathBuf },
    /// Snapshot JSON to MIDI.
    Midi { input: PathBuf },
    /// MusicXML to playback notes (JSON).
    Decode { input: PathBuf },
    /// MIDI file to playback notes and tempo (JSON).
    Inspect { input: PathBuf },
    /// Writes a built-in groove as a snapshot.
    Preset { preset: Preset },
}

/// Command-line options for the application.
#[derive(Debug)]
struct CliOptions {
    command: Command,
    /// Tempo for MIDI output.
    bpm: u32,
    /// Measure count for generated presets.
    measures: u32,
    /// Output file; stdout when absent.
    output: Option<PathBuf>,
}

fn print_help(program: &str) {
    eprintln!("drumscore - drum grid to MusicXML and MIDI converter");
    eprintln!();
    eprintln!("Usage: {} <COMMAND> [OPTIONS]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  xml <score.json>              Write MusicXML for a saved score");
    eprintln!("  midi <score.json>             Write a MIDI file for a saved score");
    eprintln!("  decode <file.musicxml>        Print the notes a MusicXML file plays");
    eprintln!("  inspect <file.mid>            Print the notes and tempo of a MIDI file");
    eprintln!("  preset <rock|pop|shuffle>     Write a preset groove as a saved score");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -b, --bpm N          Tempo for MIDI output (default {})", DEFAULT_BPM);
    eprintln!("  -m, --measures N     Measures for presets (default {})", DEFAULT_MEASURES);
    eprintln!("  -o, --output PATH    Write to PATH instead of stdout");
    eprintln!("  -h, --help           Print this help message");
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let program = args.first().map(String::as_str).unwrap_or("drumscore");
        let mut positional: Vec<&str> = Vec::new();
        let mut bpm = DEFAULT_BPM;
        let mut measures = DEFAULT_MEASURES;
        let mut output: Option<PathBuf> = None;
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--bpm" | "-b" => {
                    i += 1;
                    let value = args.get(i).context("--bpm requires a value")?;
                    bpm = value
                        .parse()
                        .with_context(|| format!("invalid tempo: {}", value))?;
                    if bpm == 0 {
                        bail!("tempo must be greater than zero");
                    }
                }
                "--measures" | "-m" => {
                    i += 1;
                    let value = args.get(i).context("--measures requires a value")?;
                    measures = value
                        .parse()
                        .with_context(|| format!("invalid measure count: {}", value))?;
                }
                "--output" | "-o" => {
                    i += 1;
                    let value = args.get(i).context("--output requires a path")?;
                    output = Some(PathBuf::from(value));
                }
                "--help" | "-h" => {
                    print_help(program);
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    eprintln!("Unknown option: {}", other);
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
                other => positional.push(other),
            }
            i += 1;
        }

        let command = match positional.as_slice() {
            ["xml", input] => Command::Xml {
                input: PathBuf::from(input),
            },
            ["midi", input] => Command::Midi {
                input: PathBuf::from(input),
            },
            ["decode", input] => Command::Decode {
                input: PathBuf::from(input),
            },
            ["inspect", input] => Command::Inspect {
                input: PathBuf::from(input),
            },
            ["preset", name] => Command::Preset {
                preset: Preset::from_name(name)
                    .with_context(|| format!("unknown preset: {}", name))?,
            },
            [] => {
                print_help(program);
                std::process::exit(1);
            }
            other => bail!("unrecognized command: {}", other.join(" ")),
        };

        Ok(Self {
            command,
            bpm,
            measures,
            output,
        })
    }
}

/// Writes the result to the output file, or stdout when none was given.
fn emit(output: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes).context("Failed to write to stdout")?;
            stdout.flush().context("Failed to write to stdout")
        }
    }
}

fn load_pattern(input: &Path) -> Result<Pattern> {
    Pattern::load_from_file(input)
        .with_context(|| format!("Failed to load score {}", input.display()))
}

fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let output = cli.output.as_deref();
    match &cli.command {
        Command::Xml { input } => {
            let pattern = load_pattern(input)?;
            let xml = build_musicxml(&pattern.layout());
            emit(output, xml.as_bytes())?;
        }
        Command::Midi { input } => {
            let pattern = load_pattern(input)?;
            let xml = build_musicxml(&pattern.layout());
            let bytes = build_midi_from_musicxml(&xml, cli.bpm)
                .context("Failed to convert score to MIDI")?;
            emit(output, &bytes)?;
        }
        Command::Decode { input } => {
            let xml = fs::read_to_string(input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let score = parse_midi_notes_from_musicxml(&xml)
                .with_context(|| format!("Failed to decode {}", input.display()))?;
            let json = serde_json::to_string_pretty(&score)?;
            emit(output, json.as_bytes())?;
        }
        Command::Inspect { input } => {
            let imported = import_midi_file(input)
                .with_context(|| format!("Failed to import {}", input.display()))?;
            let json = serde_json::to_string_pretty(&imported)?;
            emit(output, json.as_bytes())?;
        }
        Command::Preset { preset } => {
            let pattern = Pattern::with_preset(*preset, cli.measures);
            let json = pattern.to_json().context("Failed to serialize preset")?;
            emit(output, json.as_bytes())?;
        }
    }

    tracing::info!(command = ?cli.command, "done");
    Ok(())
}
