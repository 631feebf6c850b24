#![warn(missing_docs)]

//! Microtonal tuning engine.
//!
//! This library parses SCL (scale) and KBM (keyboard mapping) files and compiles a scale and a
//! mapping into a [`Tuning`]: precomputed tables giving the frequency, log frequency and scale
//! degree of every MIDI note from -256 to 255.
//!
//! ```
//! # use scl_tuning::*;
//! let scale = Scale::parse_scl_data(
//!     "! pythagorean-5.scl
//!     Pentatonic fifths
//!     5
//!     9/8
//!     81/64
//!     3/2
//!     27/16
//!     2/1",
//! )
//! .unwrap();
//!
//! let mapping = KeyboardMapping::tune_note_to(60, 256.0);
//! let tuning = Tuning::from_scale_and_keyboard_mapping(scale, mapping).unwrap();
//!
//! assert!((tuning.frequency_for_midi_note(60) - 256.0).abs() < 1e-9);
//! assert!((tuning.frequency_for_midi_note(63) - 384.0).abs() < 1e-9);
//! assert!((tuning.frequency_for_midi_note(65) - 512.0).abs() < 1e-9);
//! ```
//!
//! Constructing tunings and parsing files report problems through [`TuningError`],
//! [`ParseError`] and [`BuildError`]. The crate logs through the [`log`] facade and never
//! installs a logger itself.

mod error;
mod keyboard_mapping;
mod scale;
mod tone;
mod tuning;

pub use error::{BuildError, ParseError, ParseErrorKind, TuningError};
pub use keyboard_mapping::{KeyboardMapping, ScaleDegree};
pub use scale::Scale;
pub use tone::{Tone, ToneKind, ToneValue};
pub use tuning::{Tuning, TuningOptions, TABLE_SIZE};

/// Frequency of a MIDI note 0. Equal to `440 * 2^(-69/12)`.
pub const MIDI_0_FREQ: f64 = 8.17579891564371;
