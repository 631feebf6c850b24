use std::{error::Error, fmt::Display, io};

/// What went wrong on a single line of an SCL or KBM file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Line contains a `.` but is not a number.
    InvalidCents,
    /// Numerator of a ratio is not an integer.
    InvalidNumerator,
    /// Denominator of a ratio is not an integer.
    InvalidDenominator,
    /// Ratio has more than two `/`-separated parts.
    InvalidFraction,
    /// Numerator or denominator of a ratio is zero or negative.
    NonPositiveRatio,
    /// Note count is not a positive integer.
    InvalidNoteCount,
    /// Character not allowed in a KBM numeric line.
    InvalidCharacter(char),
    /// Field expected an integer.
    InvalidInteger,
    /// Field expected a floating point number.
    InvalidFloat,
    /// Key entry is neither `x` nor a value `>= -1`.
    InvalidKey,
    /// Input ended before all notes of the scale were read.
    IncompleteScale,
    /// Input ended before the keys section of the mapping was reached.
    IncompleteMapping,
    /// Input ended with fewer keys than the mapping size announced.
    KeyCountMismatch {
        /// Declared map size.
        expected: usize,
        /// Keys actually read.
        found: usize,
    },
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::InvalidCents => write!(f, "contains . but is not numeric"),
            ParseErrorKind::InvalidNumerator => write!(f, "numerator is not numeric"),
            ParseErrorKind::InvalidDenominator => write!(f, "denominator is not numeric"),
            ParseErrorKind::InvalidFraction => write!(f, "not a valid fraction"),
            ParseErrorKind::NonPositiveRatio => {
                write!(f, "ratio terms must be positive and non-zero")
            }
            ParseErrorKind::InvalidNoteCount => write!(f, "note count must be a positive integer"),
            ParseErrorKind::InvalidCharacter(c) => {
                write!(f, "bad character '{}'/{}", c.escape_default(), *c as u32)
            }
            ParseErrorKind::InvalidInteger => write!(f, "could not parse as an integer number"),
            ParseErrorKind::InvalidFloat => {
                write!(f, "could not parse as a floating point number")
            }
            ParseErrorKind::InvalidKey => write!(f, "key must be 'x' or a value >= -1"),
            ParseErrorKind::IncompleteScale => write!(f, "Incomplete SCL file"),
            ParseErrorKind::IncompleteMapping => {
                write!(f, "Incomplete KBM file, unable to get keys section of file")
            }
            ParseErrorKind::KeyCountMismatch { expected, found } => write!(
                f,
                "different number of keys than mapping file indicates: count is {expected} and we parsed {found} keys"
            ),
        }
    }
}

/// Error parsing an SCL/KBM file or string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number. For end-of-input errors this is the last line read.
    pub line: usize,
    /// The offending line, trimmed. Empty for end-of-input errors.
    pub text: String,
    /// The cause.
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn new(line: usize, text: &str, kind: ParseErrorKind) -> Self {
        ParseError {
            line,
            text: text.to_string(),
            kind,
        }
    }

    pub(crate) fn at_end(line: usize, kind: ParseErrorKind) -> Self {
        ParseError::new(line, "", kind)
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.text.is_empty() {
            write!(f, "Error parsing line {}: {}", self.line, self.kind)
        } else {
            write!(
                f,
                "Error parsing line {} (\"{}\"): {}",
                self.line, self.text, self.kind
            )
        }
    }
}

impl Error for ParseError {}

/// A scale and a keyboard mapping that cannot be combined into a [`Tuning`](crate::Tuning).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Scale contains no notes.
    EmptyScale,
    /// Keyboard mapping's octave degrees exceed the scale's tone count.
    MappingTooLarge {
        /// `octave_degrees` of the mapping.
        octave_degrees: i32,
        /// Tone count of the scale.
        scale_count: usize,
    },
    /// A mapped key points past the end of the scale.
    KeyOutOfRange {
        /// Index into the mapping's keys.
        key: usize,
        /// Scale degree the key maps to.
        degree: i32,
        /// Tone count of the scale.
        scale_count: usize,
    },
    /// The middle note or tuning constant note is too far outside the MIDI range to build a
    /// table around.
    NoteOutOfRange {
        /// The offending note.
        note: i32,
    },
    /// The tuning constant note lands on an unmapped key.
    TuningCenterUnmapped {
        /// The tuning constant note.
        note: i32,
    },
}

impl Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::EmptyScale => write!(
                f,
                "Unable to tune to a scale with no notes. Your scale provided 0 notes."
            ),
            BuildError::MappingTooLarge {
                octave_degrees,
                scale_count,
            } => write!(
                f,
                "Unable to apply mapping of size {octave_degrees} to smaller scale of size {scale_count}"
            ),
            BuildError::KeyOutOfRange {
                key,
                degree,
                scale_count,
            } => write!(
                f,
                "Key {key} maps to degree {degree}, outside a scale of size {scale_count}"
            ),
            BuildError::NoteOutOfRange { note } => {
                write!(f, "Note {note} is too far outside the MIDI range")
            }
            BuildError::TuningCenterUnmapped { note } => {
                write!(f, "Attempted to tune unmapped key {note}")
            }
        }
    }
}

impl Error for BuildError {}

/// Errors
#[derive(Debug)]
pub enum TuningError {
    /// Error parsing an SCL/KBM file/string.
    Parse(ParseError),
    /// Scale and mapping cannot be combined.
    Build(BuildError),
    /// Error reading the file or stream.
    Io(io::Error),
    /// Cannot divide zero span.
    ZeroSpan,
    /// Cannot divide into zero steps.
    ZeroSteps,
    /// Cannot divide non-positive cents amount.
    NonPositiveCents,
}

impl Display for TuningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TuningError::Parse(error) => write!(f, "{error}"),
            TuningError::Build(error) => write!(f, "{error}"),
            TuningError::Io(error) => write!(f, "Error reading the file: {error}"),
            TuningError::ZeroSpan => write!(f, "Cannot divide zero span."),
            TuningError::ZeroSteps => write!(f, "Cannot divide by zero steps."),
            TuningError::NonPositiveCents => {
                write!(f, "Cannot divide by non-positive cents amount.")
            }
        }
    }
}

impl Error for TuningError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TuningError::Parse(error) => Some(error),
            TuningError::Build(error) => Some(error),
            TuningError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ParseError> for TuningError {
    fn from(error: ParseError) -> Self {
        TuningError::Parse(error)
    }
}

impl From<BuildError> for TuningError {
    fn from(error: BuildError) -> Self {
        TuningError::Build(error)
    }
}

impl From<io::Error> for TuningError {
    fn from(error: io::Error) -> Self {
        TuningError::Io(error)
    }
}
