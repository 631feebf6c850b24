use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scl_tuning::{KeyboardMapping, Scale, ScaleDegree, Tuning, TuningOptions};

/// Inspect SCL/KBM files and the note tables they produce
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a .scl or .kbm file and print a summary
    Check {
        /// Path to the scale or keyboard mapping file
        file: PathBuf,
    },
    /// Print frequency, log frequency and scale degree for a range of notes
    Table {
        /// Scale file, 12-TET if omitted
        #[arg(long)]
        scl: Option<PathBuf>,

        /// Keyboard mapping file, note 60 at 261.63 Hz if omitted
        #[arg(long)]
        kbm: Option<PathBuf>,

        /// First MIDI note to print
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        from: i32,

        /// Last MIDI note to print
        #[arg(long, default_value_t = 127, allow_negative_numbers = true)]
        to: i32,

        /// Fill unmapped notes by interpolating their neighbours
        #[arg(long)]
        interpolate: bool,

        /// Allow the tuning constant note to be an unmapped key
        #[arg(long)]
        allow_unmapped_center: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    match args.command {
        Commands::Check { file } => check(&file),
        Commands::Table {
            scl,
            kbm,
            from,
            to,
            interpolate,
            allow_unmapped_center,
        } => {
            if from > to {
                bail!("--from ({from}) must be <= --to ({to})");
            }

            let scale = match scl {
                Some(path) => read_scale(&path)?,
                None => Scale::even_temperament_12_note_scale(),
            };
            let mapping = match kbm {
                Some(path) => read_mapping(&path)?,
                None => KeyboardMapping::new(),
            };
            let options = TuningOptions {
                allow_tuning_center_on_unmapped: allow_unmapped_center,
            };

            let mut tuning = Tuning::with_options(scale, mapping, options)
                .context("unable to build tuning")?;
            if interpolate {
                tuning = tuning.with_skipped_notes_interpolated();
            }

            print_table(&tuning, from, to);
            Ok(())
        }
    }
}

fn read_scale(path: &Path) -> Result<Scale> {
    Scale::read_scl_file(path).with_context(|| format!("reading scale '{}'", path.display()))
}

fn read_mapping(path: &Path) -> Result<KeyboardMapping> {
    KeyboardMapping::read_kbm_file(path)
        .with_context(|| format!("reading keyboard mapping '{}'", path.display()))
}

fn check(file: &Path) -> Result<()> {
    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("scl") => {
            let scale = read_scale(file)?;
            println!("{}", scale.description);
            println!(
                "{} tones, period {:.6} octaves",
                scale.count(),
                scale.period().unwrap_or(0.0)
            );
            for (i, tone) in scale.tones().iter().enumerate() {
                println!("{:>4}  {:>14.6}c  {}", i + 1, tone.cents(), tone);
            }
        }
        Some("kbm") => {
            let mapping = read_mapping(file)?;
            println!(
                "map size {}, notes {}..={}, middle note {}",
                mapping.count(),
                mapping.first_midi,
                mapping.last_midi,
                mapping.middle_note
            );
            println!(
                "note {} at {} Hz, octave degrees {}",
                mapping.tuning_constant_note, mapping.tuning_frequency, mapping.octave_degrees
            );
            let keys: Vec<String> = mapping.degrees().map(|d| d.to_string()).collect();
            if !keys.is_empty() {
                println!("keys: {}", keys.join(" "));
            }
        }
        _ => bail!("'{}' is neither a .scl nor a .kbm file", file.display()),
    }

    Ok(())
}

fn print_table(tuning: &Tuning, from: i32, to: i32) {
    println!("{:>5}  {:>14}  {:>10}  {:>6}", "note", "freq_hz", "log2", "degree");
    for note in from..=to {
        let degree = match tuning.scale_degree_for_midi_note(note) {
            ScaleDegree::Mapped(d) => d.to_string(),
            ScaleDegree::Unmapped => String::from("-"),
        };
        println!(
            "{:>5}  {:>14.6}  {:>10.6}  {:>6}",
            note,
            tuning.frequency_for_midi_note(note),
            tuning.log_scaled_frequency_for_midi_note(note),
            degree
        );
    }
}
