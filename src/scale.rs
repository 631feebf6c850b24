use std::{fs, io::Read, path::Path, str::FromStr};

use log::{debug, trace};

use crate::{
    error::{ParseError, ParseErrorKind, TuningError},
    tone::Tone,
};

/// The Scale is the representation of the SCL file.
///
/// It contain several key features. Most importantly it has a [`Scale::count()`] and a slice of
/// [`Tone`]s, [`Scale::tones()`]. The tones omit the implicit unison; the last tone is the
/// period the scale repeats at.
///
/// In most normal use, you will simply pass around instances of this struct to a
/// [`Tuning`](crate::Tuning), but in some cases you may want to create or inspect this struct
/// yourself. Especially if you are displaying this struct to your end users, you may want to use
/// the [`Scale::raw_text`] or [`Scale::count()`] methods.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Scale {
    /// The name of the scale, the file name if read from a file. Informational only.
    pub name: String,

    /// The description in the SCL file. Informational only.
    pub description: String,

    /// The raw text of the SCL file used to create this Scale.
    pub raw_text: String,

    count: usize,
    tones: Vec<Tone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SclState {
    Header,
    Count,
    Notes,
    Trailing,
}

/// Line-at-a-time SCL reader. Each state has its own transition method.
struct SclParser {
    state: SclState,
    lineno: usize,
    scale: Scale,
}

impl SclParser {
    fn new() -> Self {
        SclParser {
            state: SclState::Header,
            lineno: 0,
            scale: Scale::new(),
        }
    }

    fn feed(&mut self, line: &str) -> Result<(), ParseError> {
        self.lineno += 1;
        let line = line.trim();

        if line.starts_with('!') || (self.state == SclState::Notes && line.is_empty()) {
            return Ok(());
        }

        let next = match self.state {
            SclState::Header => self.read_header(line),
            SclState::Count => self.read_count(line)?,
            SclState::Notes => self.read_note(line)?,
            SclState::Trailing => self.read_trailing(line),
        };

        if next != self.state {
            trace!("scl line {}: {:?} -> {:?}", self.lineno, self.state, next);
            self.state = next;
        }
        Ok(())
    }

    fn read_header(&mut self, line: &str) -> SclState {
        self.scale.description = line.to_string();
        SclState::Count
    }

    fn read_count(&mut self, line: &str) -> Result<SclState, ParseError> {
        self.scale.count = match line.parse::<usize>() {
            Ok(count) if count > 0 => count,
            _ => {
                return Err(ParseError::new(
                    self.lineno,
                    line,
                    ParseErrorKind::InvalidNoteCount,
                ))
            }
        };
        Ok(SclState::Notes)
    }

    fn read_note(&mut self, line: &str) -> Result<SclState, ParseError> {
        let tone = Tone::parse(line, Some(self.lineno))?;
        self.scale.tones.push(tone);

        if self.scale.tones.len() == self.scale.count {
            Ok(SclState::Trailing)
        } else {
            Ok(SclState::Notes)
        }
    }

    fn read_trailing(&mut self, line: &str) -> SclState {
        if !line.is_empty() {
            debug!("ignoring trailing scl line {}: {line:?}", self.lineno);
        }
        SclState::Trailing
    }

    fn finish(self, raw_text: &str) -> Result<Scale, ParseError> {
        if self.state != SclState::Trailing {
            return Err(ParseError::at_end(
                self.lineno,
                ParseErrorKind::IncompleteScale,
            ));
        }

        let mut scale = self.scale;
        scale.raw_text = raw_text.to_string();
        debug!(
            "parsed scale {:?}: {} tones, period {:?}",
            scale.description,
            scale.count,
            scale.period()
        );
        Ok(scale)
    }
}

impl Scale {
    /// Constructs an empty scale. It has no tones, so it cannot be tuned to.
    pub fn new() -> Self {
        Scale {
            name: String::from("empty scale"),
            ..Default::default()
        }
    }

    /// Number of tones in the scale.
    pub fn count(&self) -> usize {
        self.count
    }

    /// The tones, without the implicit unison.
    pub fn tones(&self) -> &[Tone] {
        &self.tones
    }

    /// The repeating interval in octaves, `float_value() - 1` of the last tone. `None` for an
    /// empty scale.
    pub fn period(&self) -> Option<f64> {
        self.tones.last().map(|t| t.float_value() - 1.0)
    }

    /// Returns a Scale or an error from the SCL file contents in `fname`. The name of the scale
    /// is set to `fname`.
    pub fn read_scl_file<P>(fname: P) -> Result<Self, TuningError>
    where
        P: AsRef<Path>,
    {
        let content = fs::read_to_string(&fname)?;
        let mut res = Scale::parse_scl_data(&content)?;
        res.name = fname.as_ref().display().to_string();
        Ok(res)
    }

    /// Returns a Scale or an error from a stream of SCL data.
    pub fn read_scl_stream<R: Read>(mut rdr: R) -> Result<Self, TuningError> {
        let mut content = String::new();
        rdr.read_to_string(&mut content)?;
        Ok(Scale::parse_scl_data(&content)?)
    }

    /// Returns a Scale or an error from the SCL file contents in memory.
    ///
    /// ```
    /// # use scl_tuning::*;
    /// let s = Scale::parse_scl_data("! fifths.scl\nTwo fifths\n2\n3/2\n2/1\n").unwrap();
    /// assert_eq!(s.description, "Two fifths");
    /// assert_eq!(s.count(), 2);
    /// ```
    pub fn parse_scl_data(scl_contents: &str) -> Result<Self, ParseError> {
        let mut parser = SclParser::new();
        for line in scl_contents.lines() {
            parser.feed(line)?;
        }
        parser.finish(scl_contents)
    }

    /// Provides a utility scale which is the "standard tuning" scale.
    pub fn even_temperament_12_note_scale() -> Self {
        let mut data = String::from(
            "! 12 Tone Equal Temperament.scl\n\
             !\n\
             12 Tone Equal Temperament | ED2-12 - Equal division of harmonic 2 into 12 parts\n \
             12\n\
             !\n",
        );
        for step in 1..12 {
            data += &format!(" {:.5}\n", 100.0 * step as f64);
        }
        data += " 2/1\n";

        Scale::parse_scl_data(&data).expect("12-TET scale text is well formed")
    }

    /// Provides a scale refered to as "ED2-17" or "ED3-24" by dividing the `span` into `m` points.
    /// `Scale::even_division_of_span_by_m(2, 12)` should be the
    /// [`Scale::even_temperament_12_note_scale()`].
    ///
    /// ```
    /// # use scl_tuning::Scale;
    /// let s1 = Scale::even_division_of_span_by_m(2, 12).unwrap(); // equal to `even_temperament_12_note_scale()`
    /// let s2 = Scale::even_division_of_span_by_m(2, 17).unwrap(); // ED2-17
    /// let s3 = Scale::even_division_of_span_by_m(3, 24).unwrap(); // ED3-24
    /// assert_eq!(s3.count(), 24);
    /// ```
    pub fn even_division_of_span_by_m(span: u32, m: u32) -> Result<Self, TuningError> {
        if span == 0 {
            return Err(TuningError::ZeroSpan);
        }

        if m == 0 {
            return Err(TuningError::ZeroSteps);
        }

        let title = format!("Automatically generated ED{span}-{m} scale");
        let step = 1200.0 * (span as f64).log2() / m as f64;
        let last = format!("{span}/1");

        Ok(Scale::parse_scl_data(&even_division_text(&title, step, m, &last))?)
    }

    /// Provides a scale which divides `cents` into `m` steps. It is less frequently used than
    /// [`Scale::even_division_of_span_by_m()`] for obvious reasons. If you want the last tone
    /// labeled differently than the cents argument (say `3/2` rather than `701.955`), pass in
    /// the associated label.
    pub fn even_division_of_cents_by_m(
        cents: f64,
        m: u32,
        last_label: Option<&str>,
    ) -> Result<Self, TuningError> {
        if cents.is_nan() || cents <= 0.0 {
            return Err(TuningError::NonPositiveCents);
        }

        if m == 0 {
            return Err(TuningError::ZeroSteps);
        }

        let title = format!("Automatically generated Even Division of {cents} ct into {m} scale");
        let last = match last_label {
            Some(label) => label.to_string(),
            None => cents_line(cents),
        };

        Ok(Scale::parse_scl_data(&even_division_text(
            &title,
            cents / m as f64,
            m,
            &last,
        ))?)
    }
}

impl FromStr for Scale {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scale::parse_scl_data(s)
    }
}

/// Always carries a `.` so it reads back as cents, never as a ratio.
fn cents_line(cents: f64) -> String {
    format!("{cents:.17}")
}

fn even_division_text(title: &str, step: f64, m: u32, last: &str) -> String {
    let mut data = format!("! {title}\n{title}\n{m}\n!\n");
    for i in 1..m {
        data += &cents_line(step * i as f64);
        data.push('\n');
    }
    data += last;
    data.push('\n');
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser_after(lines: &[&str]) -> SclParser {
        let mut p = SclParser::new();
        for line in lines {
            p.feed(line).unwrap();
        }
        p
    }

    #[test]
    fn comments_do_not_advance_state() {
        let p = parser_after(&["! a comment", "!", "  ! indented comment"]);
        assert_eq!(p.state, SclState::Header);
    }

    #[test]
    fn empty_description_is_a_description() {
        let p = parser_after(&["! comment", ""]);
        assert_eq!(p.state, SclState::Count);
        assert_eq!(p.scale.description, "");
    }

    #[test]
    fn blank_lines_between_notes_are_skipped() {
        let p = parser_after(&["desc", "2", "", "100.0", "", "!", "2/1"]);
        assert_eq!(p.state, SclState::Trailing);
        assert_eq!(p.scale.tones.len(), 2);
    }

    #[test]
    fn trailing_lines_are_not_parsed() {
        let p = parser_after(&["desc", "1", "2/1", "garbage", "3/0", "1.2.3"]);
        assert_eq!(p.state, SclState::Trailing);
        assert_eq!(p.scale.tones.len(), 1);
    }

    #[test]
    fn count_must_be_positive() {
        for bad in ["0", "-3", "twelve", ""] {
            let mut p = parser_after(&["desc"]);
            let err = p.feed(bad).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::InvalidNoteCount, "{bad:?}");
            assert_eq!(err.line, 2);
        }
    }

    #[test]
    fn huge_note_count_runs_out_of_notes() {
        let err = Scale::parse_scl_data("desc\n18446744073709551615\n2/1\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::IncompleteScale);

        let err = Scale::parse_scl_data("desc\n100000000000000000\n100.0\n2/1\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::IncompleteScale);
    }

    #[test]
    fn missing_notes_are_an_error() {
        for data in ["", "desc", "desc\n3", "desc\n3\n100.0\n200.0\n"] {
            let err = Scale::parse_scl_data(data).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::IncompleteScale, "{data:?}");
        }
    }

    #[test]
    fn dos_line_endings() {
        let unix = Scale::parse_scl_data("desc\n2\n150.0\n2/1\n").unwrap();
        let dos = Scale::parse_scl_data("desc\r\n2\r\n150.0\r\n2/1\r\n").unwrap();
        assert_eq!(dos.description, "desc");
        assert_eq!(unix.tones(), dos.tones());
    }

    #[test]
    fn period_is_last_tone() {
        let s = Scale::parse_scl_data("fifths\n2\n3/2\n2/1\n").unwrap();
        assert_eq!(s.period(), Some(1.0));
        assert_eq!(Scale::new().period(), None);
    }

    #[test]
    fn default_label_reads_back_as_cents() {
        let s = Scale::even_division_of_cents_by_m(1200.0, 12, None).unwrap();
        let last = &s.tones()[11];
        assert_eq!(last.kind(), crate::ToneKind::Cents);
        assert!((last.cents() - 1200.0).abs() < 1e-9);

        let s = Scale::even_division_of_cents_by_m(701.955, 7, Some("3/2")).unwrap();
        assert_eq!(s.tones()[6].ratio(), Some((3, 2)));
    }
}
