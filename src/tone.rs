use std::{fmt::Display, str::FromStr};

use crate::error::{ParseError, ParseErrorKind};

/// Whether a tone was written in cents or as a ratio.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ToneKind {
    /// Decimal cents value, e.g. `700.0`.
    Cents,
    /// Integer ratio, e.g. `3/2` or `2`.
    Ratio,
}

/// Value of a tone.
///
/// The value of a tone is given either as a cents value or ratio.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ToneValue {
    /// Value of a tone given as cents value.
    /// ```
    /// # use scl_tuning::*;
    /// ToneValue::Cents(1200.0); // is an octave
    /// ToneValue::Cents(700.0); // is an 12-EDO fifth
    /// ```
    Cents(f64),

    /// Value of a tone given as a ratio of numerator and denominator.
    /// ```
    /// # use scl_tuning::*;
    /// ToneValue::Ratio(2, 1); // is an octave as well
    /// ToneValue::Ratio(3, 2); // is a JI fifth
    /// ```
    Ratio(i64, i64),
}

impl ToneValue {
    /// Kind of the value.
    pub fn kind(&self) -> ToneKind {
        match self {
            ToneValue::Cents(_) => ToneKind::Cents,
            ToneValue::Ratio(..) => ToneKind::Ratio,
        }
    }

    /// Pitch above the unison in cents.
    pub fn cents(&self) -> f64 {
        match *self {
            ToneValue::Cents(value) => value,
            ToneValue::Ratio(n, d) => 1200.0 * (n as f64 / d as f64).log2(),
        }
    }

    /// Pitch in octaves above the unison, offset by one: `1.0` is the unison and `2.0` an
    /// octave above.
    pub fn float_value(&self) -> f64 {
        self.cents() / 1200.0 + 1.0
    }
}

impl Default for ToneValue {
    fn default() -> Self {
        ToneValue::Ratio(1, 1)
    }
}

impl PartialOrd for ToneValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.cents().partial_cmp(&other.cents())
    }
}

impl Display for ToneValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToneValue::Cents(value) => write!(f, "{value}c"),
            ToneValue::Ratio(n, d) => write!(f, "{n}/{d}"),
        }
    }
}

/// A Tone is a single entry in a SCL file. It is expressed either in cents or in a ratio, as
/// described in the SCL documentation.
///
/// In most normal use, you will not use this struct, and it will be internal to a
/// [`Scale`](crate::Scale).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Tone {
    /// Value of the tone.
    pub value: ToneValue,

    /// String representation of the tone. Is set if parsed from string.
    pub string_rep: String,

    /// Number of line on which the tone was specified. Is set if parsed from file.
    pub lineno: Option<usize>,
}

impl Tone {
    /// Default constructor. Initializes tone with ratio `1/1` (or 0 cents).
    pub fn new() -> Self {
        Tone::default()
    }

    /// Whether the tone is a cents value or a ratio.
    pub fn kind(&self) -> ToneKind {
        self.value.kind()
    }

    /// Returns cents value of a tone.
    pub fn cents(&self) -> f64 {
        self.value.cents()
    }

    /// Returns float value of a tone. Equal to `cents() / 1200 + 1`.
    pub fn float_value(&self) -> f64 {
        self.value.float_value()
    }

    /// Numerator and denominator for ratio tones.
    pub fn ratio(&self) -> Option<(i64, i64)> {
        match self.value {
            ToneValue::Ratio(n, d) => Some((n, d)),
            ToneValue::Cents(_) => None,
        }
    }

    /// Parses one scale line into a tone.
    ///
    /// A line containing a `.` is a cents value. Anything else must be a ratio `n/d` or a
    /// bare integer `n`, read as `n/1`. Both terms of a ratio must be positive.
    ///
    /// ```
    /// # use scl_tuning::*;
    /// let fifth = Tone::parse("3/2", None).unwrap();
    /// assert_eq!(fifth.kind(), ToneKind::Ratio);
    /// assert!((fifth.cents() - 701.955).abs() < 1e-3);
    ///
    /// assert!(Tone::parse("7/4/2", Some(3)).is_err());
    /// ```
    pub fn parse(line: &str, lineno: Option<usize>) -> Result<Self, ParseError> {
        let line = line.trim();
        let fail = |kind| ParseError::new(lineno.unwrap_or_default(), line, kind);

        let value = if line.contains('.') {
            match line.parse::<f64>() {
                Ok(cents) if cents.is_finite() => ToneValue::Cents(cents),
                _ => return Err(fail(ParseErrorKind::InvalidCents)),
            }
        } else {
            let parts: Vec<&str> = line.split('/').map(str::trim).collect();
            let (n, d) = match parts[..] {
                [n] => (n, None),
                [n, d] => (n, Some(d)),
                _ => return Err(fail(ParseErrorKind::InvalidFraction)),
            };

            let n: i64 = n
                .parse()
                .map_err(|_| fail(ParseErrorKind::InvalidNumerator))?;
            let d: i64 = match d {
                Some(d) => d
                    .parse()
                    .map_err(|_| fail(ParseErrorKind::InvalidDenominator))?,
                None => 1,
            };

            if n <= 0 || d <= 0 {
                return Err(fail(ParseErrorKind::NonPositiveRatio));
            }

            ToneValue::Ratio(n, d)
        };

        Ok(Tone {
            value,
            string_rep: line.to_string(),
            lineno,
        })
    }
}

impl FromStr for Tone {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tone::parse(s, None)
    }
}

impl Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.string_rep)
    }
}

impl Default for Tone {
    fn default() -> Self {
        Tone {
            value: ToneValue::default(),
            string_rep: String::from("1/1"),
            lineno: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_line() {
        let t = Tone::parse("130.0", Some(1)).unwrap();
        assert_eq!(t.kind(), ToneKind::Cents);
        assert_eq!(t.cents(), 130.0);
        assert_eq!(t.float_value(), 130.0 / 1200.0 + 1.0);
        assert_eq!(t.ratio(), None);
    }

    #[test]
    fn ratio_and_bare_integer() {
        let t = Tone::parse("7/2", Some(1)).unwrap();
        assert_eq!(t.ratio(), Some((7, 2)));
        assert!((t.float_value() - ((7.0f64 / 2.0).log2() + 1.0)).abs() < 1e-12);

        let t = Tone::parse("3", Some(1)).unwrap();
        assert_eq!(t.ratio(), Some((3, 1)));
        assert_eq!(t.string_rep, "3");
    }

    #[test]
    fn octave_is_exact() {
        let t: Tone = "2/1".parse().unwrap();
        assert_eq!(t.cents(), 1200.0);
        assert_eq!(t.float_value(), 2.0);
    }

    #[test]
    fn bad_tones() {
        let cases = [
            ("Not a number", ParseErrorKind::InvalidNumerator),
            ("100.200 with extra stuff", ParseErrorKind::InvalidCents),
            ("7/4/2", ParseErrorKind::InvalidFraction),
            ("7*2", ParseErrorKind::InvalidNumerator),
            ("7/x", ParseErrorKind::InvalidDenominator),
            ("0/1", ParseErrorKind::NonPositiveRatio),
            ("3/0", ParseErrorKind::NonPositiveRatio),
        ];

        for (line, kind) in cases {
            let err = Tone::parse(line, Some(7)).unwrap_err();
            assert_eq!(err.kind, kind, "{line}");
            assert_eq!(err.line, 7);
            assert_eq!(err.text, line);
        }
    }
}
