use std::{fmt::Display, fs, io::Read, path::Path, str::FromStr};

use log::{debug, trace};

use crate::{
    error::{ParseError, ParseErrorKind, TuningError},
    MIDI_0_FREQ,
};

/// Where a key lands in the scale: a zero-based scale degree, or nowhere.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScaleDegree {
    /// The key plays this scale degree.
    Mapped(usize),
    /// The key is silent (`x` in a KBM file).
    Unmapped,
}

impl ScaleDegree {
    /// Reads the table form, where any negative value means unmapped.
    pub fn from_raw(raw: i32) -> Self {
        match usize::try_from(raw) {
            Ok(degree) => ScaleDegree::Mapped(degree),
            Err(_) => ScaleDegree::Unmapped,
        }
    }

    /// The table form, `-1` for unmapped.
    pub fn to_raw(self) -> i32 {
        match self {
            ScaleDegree::Mapped(degree) => degree as i32,
            ScaleDegree::Unmapped => -1,
        }
    }

    /// Whether the key plays a note.
    pub fn is_mapped(self) -> bool {
        matches!(self, ScaleDegree::Mapped(_))
    }

    /// The degree, if mapped.
    pub fn degree(self) -> Option<usize> {
        match self {
            ScaleDegree::Mapped(degree) => Some(degree),
            ScaleDegree::Unmapped => None,
        }
    }
}

impl Display for ScaleDegree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleDegree::Mapped(degree) => write!(f, "{degree}"),
            ScaleDegree::Unmapped => write!(f, "x"),
        }
    }
}

/// The KeyboardMapping struct represents a KBM file.
///
/// In most cases, the salient features are the [`KeyboardMapping::tuning_constant_note`] and
/// [`KeyboardMapping::tuning_frequency`], which allow you to pick a fixed note in the MIDI keyboard
/// when retuning. The KBM file can also remap individual keys to individual points in a scale,
/// see [`KeyboardMapping::key()`].
///
/// Just as with [`Scale`](crate::Scale) the [`KeyboardMapping::raw_text`] member contains the
/// text of the KBM file used.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardMapping {
    count: usize,

    /// First MIDI note to be mapped. Informational only.
    pub first_midi: i32,

    /// Last MIDI note to be mapped. Informational only.
    pub last_midi: i32,

    /// MIDI note where the first entry of the scale is mapped.
    pub middle_note: i32,

    /// MIDI note whose frequency is fixed.
    pub tuning_constant_note: i32,

    /// Frequency of the tuning constant note in Hz.
    pub tuning_frequency: f64,

    /// Pitch of the tuned note. Equal to `tuning_frequency / MIDI_0_FREQ`.
    pub tuning_pitch: f64,

    /// Scale degree of the formal octave. `0`, or equal to the map size, means the scale's own
    /// period.
    pub octave_degrees: i32,

    /// Rather than an `x`, we use a `-1` for unmapped keys.
    keys: Vec<i32>,

    /// Raw text of the KBM file.
    pub raw_text: String,

    /// Name of the mapping.
    pub name: String,
}

impl Default for KeyboardMapping {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KbmState {
    MapSize,
    FirstMidi,
    LastMidi,
    Middle,
    Reference,
    Freq,
    Degree,
    Keys,
    Trailing,
}

struct KbmParser {
    state: KbmState,
    lineno: usize,
    mapping: KeyboardMapping,
}

impl KbmParser {
    fn new() -> Self {
        KbmParser {
            state: KbmState::MapSize,
            lineno: 0,
            mapping: KeyboardMapping::new(),
        }
    }

    fn error(&self, line: &str, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.lineno, line, kind)
    }

    fn feed(&mut self, line: &str) -> Result<(), ParseError> {
        self.lineno += 1;
        let line = line.trim();

        if line.starts_with('!') || line.is_empty() {
            return Ok(());
        }

        if self.state == KbmState::Trailing {
            debug!("ignoring trailing kbm line {}: {line:?}", self.lineno);
            return Ok(());
        }

        let next = if self.state == KbmState::Keys && line == "x" {
            self.read_key(-1)
        } else {
            self.check_characters(line)?;
            self.read_field(line)?
        };

        if next != self.state {
            trace!("kbm line {}: {:?} -> {:?}", self.lineno, self.state, next);
            self.state = next;
        }
        Ok(())
    }

    /// Digits, spaces and `.` only, with an optional leading sign.
    fn check_characters(&self, line: &str) -> Result<(), ParseError> {
        let bad = line
            .char_indices()
            .find(|&(i, c)| !(c == ' ' || c == '.' || c.is_ascii_digit() || (i == 0 && c == '-')));

        match bad {
            Some((_, c)) => Err(self.error(line, ParseErrorKind::InvalidCharacter(c))),
            None => Ok(()),
        }
    }

    fn int(&self, line: &str) -> Result<i32, ParseError> {
        line.parse()
            .map_err(|_| self.error(line, ParseErrorKind::InvalidInteger))
    }

    fn read_field(&mut self, line: &str) -> Result<KbmState, ParseError> {
        let next = match self.state {
            KbmState::MapSize => {
                self.mapping.count = line
                    .parse()
                    .map_err(|_| self.error(line, ParseErrorKind::InvalidInteger))?;
                KbmState::FirstMidi
            }
            KbmState::FirstMidi => {
                self.mapping.first_midi = self.int(line)?;
                KbmState::LastMidi
            }
            KbmState::LastMidi => {
                self.mapping.last_midi = self.int(line)?;
                KbmState::Middle
            }
            KbmState::Middle => {
                self.mapping.middle_note = self.int(line)?;
                KbmState::Reference
            }
            KbmState::Reference => {
                self.mapping.tuning_constant_note = self.int(line)?;
                KbmState::Freq
            }
            KbmState::Freq => {
                let freq: f64 = line
                    .parse()
                    .map_err(|_| self.error(line, ParseErrorKind::InvalidFloat))?;
                self.mapping.tuning_frequency = freq;
                self.mapping.tuning_pitch = freq / MIDI_0_FREQ;
                KbmState::Degree
            }
            KbmState::Degree => {
                self.mapping.octave_degrees = self.int(line)?;
                if self.mapping.count == 0 {
                    KbmState::Trailing
                } else {
                    KbmState::Keys
                }
            }
            KbmState::Keys => {
                let key = self.int(line)?;
                if key < -1 {
                    return Err(self.error(line, ParseErrorKind::InvalidKey));
                }
                self.read_key(key)
            }
            KbmState::Trailing => KbmState::Trailing,
        };
        Ok(next)
    }

    fn read_key(&mut self, key: i32) -> KbmState {
        self.mapping.keys.push(key);
        if self.mapping.keys.len() == self.mapping.count {
            KbmState::Trailing
        } else {
            KbmState::Keys
        }
    }

    fn finish(self, raw_text: &str) -> Result<KeyboardMapping, ParseError> {
        match self.state {
            KbmState::Trailing => {}
            KbmState::Keys => {
                return Err(ParseError::at_end(
                    self.lineno,
                    ParseErrorKind::KeyCountMismatch {
                        expected: self.mapping.count,
                        found: self.mapping.keys.len(),
                    },
                ))
            }
            _ => {
                return Err(ParseError::at_end(
                    self.lineno,
                    ParseErrorKind::IncompleteMapping,
                ))
            }
        }

        let mut mapping = self.mapping;
        mapping.raw_text = raw_text.to_string();
        debug!(
            "parsed keyboard mapping: {} keys, middle note {}, note {} at {} Hz, octave degrees {}",
            mapping.count,
            mapping.middle_note,
            mapping.tuning_constant_note,
            mapping.tuning_frequency,
            mapping.octave_degrees
        );
        Ok(mapping)
    }
}

impl KeyboardMapping {
    /// Constructs the standard mapping: no explicit keys, scale starting on note 60 and note 60
    /// tuned to `32 * MIDI_0_FREQ` (about 261.63 Hz).
    pub fn new() -> Self {
        KeyboardMapping::generated(
            "! Default KBM file\n",
            60,
            60,
            MIDI_0_FREQ * 32.0,
        )
    }

    /// Size of the explicit mapping. `0` means every key maps to the next scale degree.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Raw key table, `-1` for unmapped keys.
    pub fn keys(&self) -> &[i32] {
        &self.keys
    }

    /// Scale degree of entry `index` of the key table, `None` past the end.
    pub fn key(&self, index: usize) -> Option<ScaleDegree> {
        self.keys.get(index).copied().map(ScaleDegree::from_raw)
    }

    /// The key table as scale degrees.
    pub fn degrees(&self) -> impl Iterator<Item = ScaleDegree> + '_ {
        self.keys.iter().copied().map(ScaleDegree::from_raw)
    }

    /// Returns a KeyboardMapping or an error from a KBM file in `fname`. The name of the mapping
    /// is set to `fname`.
    pub fn read_kbm_file<P>(fname: P) -> Result<Self, TuningError>
    where
        P: AsRef<Path>,
    {
        let content = fs::read_to_string(&fname)?;
        let mut res = KeyboardMapping::parse_kbm_data(&content)?;
        res.name = fname.as_ref().display().to_string();
        Ok(res)
    }

    /// Returns a KeyboardMapping or an error from a stream of KBM data.
    pub fn read_kbm_stream<R: Read>(mut rdr: R) -> Result<Self, TuningError> {
        let mut content = String::new();
        rdr.read_to_string(&mut content)?;
        Ok(KeyboardMapping::parse_kbm_data(&content)?)
    }

    /// Returns a KeyboardMapping or an error from a KBM data in memory.
    ///
    /// ```
    /// # use scl_tuning::*;
    /// let k = KeyboardMapping::parse_kbm_data("3\n0\n127\n60\n60\n261.6\n3\n0\nx\n2\n").unwrap();
    /// assert_eq!(k.count(), 3);
    /// assert_eq!(k.key(1), Some(ScaleDegree::Unmapped));
    /// assert_eq!(k.key(2), Some(ScaleDegree::Mapped(2)));
    /// ```
    pub fn parse_kbm_data(kbm_contents: &str) -> Result<Self, ParseError> {
        let mut parser = KbmParser::new();
        for line in kbm_contents.lines() {
            parser.feed(line)?;
        }
        parser.finish(kbm_contents)
    }

    /// Creates a KeyboardMapping which keeps the MIDI note 69 (A4) set to a constant given
    /// frequency.
    pub fn tune_a69_to(freq: f64) -> Self {
        KeyboardMapping::tune_note_to(69, freq)
    }

    /// Creates a KeyboardMapping which keeps the MIDI note given set to a constant given
    /// frequency. The scale starts on note 60.
    pub fn tune_note_to(midi_note: i32, freq: f64) -> Self {
        KeyboardMapping::start_scale_on_and_tune_note_to(60, midi_note, freq)
    }

    /// Generates a KBM where `scale_start` is the note 0 of the scale, where `midi_note` is the
    /// tuned note, and where `freq` is the frequency.
    pub fn start_scale_on_and_tune_note_to(scale_start: i32, midi_note: i32, freq: f64) -> Self {
        let header = format!(
            "! Automatically generated mapping, tuning note {midi_note} to {freq} Hz\n!\n"
        );
        KeyboardMapping::generated(&header, scale_start, midi_note, freq)
    }

    fn generated(header: &str, scale_start: i32, midi_note: i32, freq: f64) -> Self {
        let raw_text = format!(
            "{header}\
             ! Size of map\n\
             0\n\
             ! First and last MIDI notes to map - map the entire keyboard\n\
             0\n\
             127\n\
             ! Middle note where the first entry in the scale is mapped.\n\
             {scale_start}\n\
             ! Reference note where frequency is fixed\n\
             {midi_note}\n\
             ! Frequency for MIDI note {midi_note}\n\
             {freq}\n\
             ! Scale degree for formal octave. This is an empty mapping, so:\n\
             0\n\
             ! Mapping. This is an empty mapping so list no keys\n"
        );

        KeyboardMapping {
            count: 0,
            first_midi: 0,
            last_midi: 127,
            middle_note: scale_start,
            tuning_constant_note: midi_note,
            tuning_frequency: freq,
            tuning_pitch: freq / MIDI_0_FREQ,
            octave_degrees: 0,
            keys: Vec::new(),
            raw_text,
            name: String::from("Mapping from patch"),
        }
    }
}

impl FromStr for KeyboardMapping {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyboardMapping::parse_kbm_data(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser_after(lines: &[&str]) -> KbmParser {
        let mut p = KbmParser::new();
        for line in lines {
            p.feed(line).unwrap();
        }
        p
    }

    const HEADER: [&str; 7] = ["4", "0", "127", "60", "69", "440.0", "4"];

    #[test]
    fn scalar_fields_in_order() {
        let p = parser_after(&HEADER);
        assert_eq!(p.state, KbmState::Keys);
        assert_eq!(p.mapping.count, 4);
        assert_eq!(p.mapping.first_midi, 0);
        assert_eq!(p.mapping.last_midi, 127);
        assert_eq!(p.mapping.middle_note, 60);
        assert_eq!(p.mapping.tuning_constant_note, 69);
        assert_eq!(p.mapping.tuning_frequency, 440.0);
        assert_eq!(p.mapping.tuning_pitch, 440.0 / MIDI_0_FREQ);
        assert_eq!(p.mapping.octave_degrees, 4);
    }

    #[test]
    fn empty_map_skips_keys_section() {
        let p = parser_after(&["0", "0", "127", "60", "69", "440.0", "0"]);
        assert_eq!(p.state, KbmState::Trailing);
    }

    #[test]
    fn x_and_minus_one_are_unmapped() {
        let mut lines = HEADER.to_vec();
        lines.extend(["0", "x", "-1", "3"]);
        let p = parser_after(&lines);
        assert_eq!(p.state, KbmState::Trailing);
        assert_eq!(p.mapping.keys, vec![0, -1, -1, 3]);
    }

    #[test]
    fn x_outside_keys_is_a_bad_character() {
        let mut p = parser_after(&HEADER[..3]);
        let err = p.feed("x").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidCharacter('x'));
        assert_eq!(err.line, 4);
    }

    #[test]
    fn bad_characters() {
        for (line, c) in [("6O", 'O'), ("60 ! middle", '!'), ("4-1", '-'), ("1,5", ',')] {
            let mut p = KbmParser::new();
            let err = p.feed(line).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::InvalidCharacter(c), "{line}");
        }
    }

    #[test]
    fn keys_below_minus_one_are_rejected() {
        let mut p = parser_after(&HEADER);
        let err = p.feed("-2").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidKey);
    }

    #[test]
    fn trailing_lines_are_not_validated() {
        let mut lines = HEADER.to_vec();
        lines.extend(["0", "1", "2", "3", "garbage", "x", "7"]);
        let p = parser_after(&lines);
        assert_eq!(p.mapping.keys, vec![0, 1, 2, 3]);
    }

    #[test]
    fn end_of_input_errors() {
        let err = KeyboardMapping::parse_kbm_data("").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::IncompleteMapping);

        let err = KeyboardMapping::parse_kbm_data("0\n0\n127\n60\n60\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::IncompleteMapping);

        let err = KeyboardMapping::parse_kbm_data(&(HEADER.join("\n") + "\n0\n1\n")).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::KeyCountMismatch {
                expected: 4,
                found: 2
            }
        );
    }

    #[test]
    fn huge_map_size_runs_out_of_keys() {
        let data = "18446744073709551615\n0\n127\n60\n60\n440.0\n0\n0\n";
        let err = KeyboardMapping::parse_kbm_data(data).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::KeyCountMismatch {
                expected: usize::MAX,
                found: 1
            }
        );
    }

    #[test]
    fn float_field_rejects_garbage() {
        let mut p = parser_after(&HEADER[..5]);
        let err = p.feed("4.4.0").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidFloat);
    }

    #[test]
    fn scale_degree_sentinel() {
        assert_eq!(ScaleDegree::from_raw(-1), ScaleDegree::Unmapped);
        assert_eq!(ScaleDegree::from_raw(4), ScaleDegree::Mapped(4));
        assert_eq!(ScaleDegree::Mapped(4).to_raw(), 4);
        assert_eq!(ScaleDegree::Unmapped.to_raw(), -1);
        assert_eq!(ScaleDegree::Unmapped.to_string(), "x");
    }

    #[test]
    fn generated_text_round_trips() {
        let k = KeyboardMapping::start_scale_on_and_tune_note_to(48, 57, 221.7);
        let parsed = KeyboardMapping::parse_kbm_data(&k.raw_text).unwrap();
        assert_eq!(parsed.count(), 0);
        assert_eq!(parsed.middle_note, 48);
        assert_eq!(parsed.tuning_constant_note, 57);
        assert_eq!(parsed.tuning_frequency, 221.7);
        assert_eq!(parsed.tuning_pitch, k.tuning_pitch);
        assert_eq!(parsed.octave_degrees, 0);
        assert_eq!(k.name, parsed.name);
        assert_eq!(KeyboardMapping::new().name, "Mapping from patch");
    }
}
