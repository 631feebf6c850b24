use log::{debug, warn};

use crate::{
    error::BuildError,
    keyboard_mapping::{KeyboardMapping, ScaleDegree},
    scale::Scale,
    MIDI_0_FREQ,
};

/// Number of entries in each lookup table of a [`Tuning`].
pub const TABLE_SIZE: usize = 512;

/// Table index of MIDI note 0. The tables cover notes `-256..=255`.
const MIDI_OFFSET: i32 = 256;

/// Bound on the middle and tuning constant notes, so key steps stay well inside `i32`.
const NOTE_LIMIT: i32 = 1 << 20;

/// Notes outside the table saturate to its first or last entry.
fn table_index(midi_note: i32) -> usize {
    midi_note
        .saturating_add(MIDI_OFFSET)
        .clamp(0, TABLE_SIZE as i32 - 1) as usize
}

/// Options for building a [`Tuning`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TuningOptions {
    /// Allow the tuning constant note to sit on an unmapped key. The table is then centered
    /// halfway between the nearest mapped keys on either side, and the constant note keeps its
    /// frequency but stays unmapped. When `false`, such a mapping fails with
    /// [`BuildError::TuningCenterUnmapped`].
    pub allow_tuning_center_on_unmapped: bool,
}

/// Pitches of keys relative to the scale's unison, before the table is anchored.
struct KeyLayout<'a> {
    scale: &'a Scale,
    mapping: &'a KeyboardMapping,
    /// Size of the scale's period in octaves.
    period: f64,
}

impl<'a> KeyLayout<'a> {
    fn new(scale: &'a Scale, mapping: &'a KeyboardMapping) -> Result<Self, BuildError> {
        let count = scale.count();
        let period = scale.period().ok_or(BuildError::EmptyScale)?;

        if let Some(&note) = [mapping.middle_note, mapping.tuning_constant_note]
            .iter()
            .find(|note| !(-NOTE_LIMIT..=NOTE_LIMIT).contains(*note))
        {
            return Err(BuildError::NoteOutOfRange { note });
        }

        if mapping.octave_degrees > count as i32 {
            return Err(BuildError::MappingTooLarge {
                octave_degrees: mapping.octave_degrees,
                scale_count: count,
            });
        }

        if let Some((key, &degree)) = mapping
            .keys()
            .iter()
            .enumerate()
            .find(|&(_, &degree)| degree >= count as i32)
        {
            return Err(BuildError::KeyOutOfRange {
                key,
                degree,
                scale_count: count,
            });
        }

        Ok(KeyLayout {
            scale,
            mapping,
            period,
        })
    }

    /// Pitch (in the `float_value` convention) and scale degree of the key `step` keys above
    /// the middle note. `None` for unmapped keys.
    ///
    /// All divisions here are floored: the divisors are positive, so `div_euclid` and
    /// `rem_euclid` round toward negative infinity.
    fn key(&self, step: i32) -> Option<(f64, i32)> {
        let count = self.scale.count() as i32;
        let key_count = self.mapping.count() as i32;
        let octave_degrees = self.mapping.octave_degrees;

        let (rounds, this_round) = if key_count == 0 {
            ((step - 1).div_euclid(count), (step - 1).rem_euclid(count))
        } else {
            let mapping_key = step.rem_euclid(key_count);
            let rotations = step.div_euclid(key_count);

            let cm = self.mapping.keys()[mapping_key as usize];
            if cm < 0 {
                return None;
            }

            if octave_degrees > 0 && octave_degrees != key_count {
                // The key table spans less than one formal octave.
                if cm == 0 {
                    (rotations - 1, octave_degrees - 1)
                } else {
                    (rotations, cm - 1)
                }
            } else {
                let push = mapping_key - cm;
                (
                    (step - push - 1).div_euclid(count),
                    (step - push - 1).rem_euclid(count),
                )
            }
        };
        debug_assert!((0..count).contains(&this_round));

        let pitch = self.scale.tones()[this_round as usize].float_value()
            + rounds as f64 * self.period;
        Some((pitch, (this_round + 1) % count))
    }

    /// Pitch halfway between the nearest mapped keys below and above `step`, looking at most
    /// one key table length each way.
    fn between_neighbours(&self, step: i32) -> Option<f64> {
        let reach = self.mapping.count().max(1) as i32;
        let below = (1..=reach).find_map(|d| self.key(step - d));
        let above = (1..=reach).find_map(|d| self.key(step + d));

        match (below, above) {
            (Some((low, _)), Some((high, _))) => Some((low + high) / 2.0),
            (Some((pitch, _)), None) | (None, Some((pitch, _))) => Some(pitch),
            (None, None) => None,
        }
    }
}

/// The Tuning struct is the primary place where you will interact with this library.
///
/// It is constructed for a scale and mapping and then gives you the ability to determine
/// frequencies across and beyond the MIDI keyboard. Since modulation can force key number well
/// outside the [0, 127] range, we support a MIDI note range from -256 to +255 spanning more than
/// the entire frequency space reasonable. Notes beyond that range read the nearest edge entry.
///
/// To use this struct, you construct a fresh instance every time you want to use a different
/// [`Scale`] and [`KeyboardMapping`]. If you want to tune to a different scale or mapping, just
/// construct a new instance. A built tuning never changes, so it can be shared across threads
/// for lookups.
///
/// ```
/// # use scl_tuning::*;
/// let s = Scale::even_temperament_12_note_scale(); // or any other function constructing a Scale
/// let k = KeyboardMapping::tune_a69_to(432.0); // or any other function constructing a KeyboardMapping
///
/// let t1 = Tuning::from_scale(s.clone()).unwrap();
/// let t2 = Tuning::from_keyboard_mapping(k.clone()).unwrap();
/// let t3 = Tuning::from_scale_and_keyboard_mapping(s, k).unwrap();
/// assert!((t3.frequency_for_midi_note(69) - 432.0).abs() < 1e-9);
/// ```
#[derive(Clone, Debug)]
pub struct Tuning {
    scale: Scale,
    keyboard_mapping: KeyboardMapping,
    options: TuningOptions,

    pitch_table: [f64; TABLE_SIZE],
    log_pitch_table: [f64; TABLE_SIZE],
    scale_degree_table: [i32; TABLE_SIZE],
}

impl Default for Tuning {
    fn default() -> Self {
        Self::new()
    }
}

impl Tuning {
    /// Constucts a `Tuning` with 12-EDO scale and standard mapping.
    pub fn new() -> Self {
        Tuning::from_scale_and_keyboard_mapping(
            Scale::even_temperament_12_note_scale(),
            KeyboardMapping::new(),
        )
        .expect("12-TET with the standard mapping always builds")
    }

    /// Constructs a `Tuning` with given `scale` and standard mapping.
    pub fn from_scale(scale: Scale) -> Result<Self, BuildError> {
        Tuning::from_scale_and_keyboard_mapping(scale, KeyboardMapping::new())
    }

    /// Constructs a `Tuning` with 12-EDO scale and given `keyboard_mapping`.
    pub fn from_keyboard_mapping(keyboard_mapping: KeyboardMapping) -> Result<Self, BuildError> {
        Tuning::from_scale_and_keyboard_mapping(
            Scale::even_temperament_12_note_scale(),
            keyboard_mapping,
        )
    }

    /// Constructs a `Tuning` with given `scale` and `keyboard_mapping`.
    pub fn from_scale_and_keyboard_mapping(
        scale: Scale,
        keyboard_mapping: KeyboardMapping,
    ) -> Result<Self, BuildError> {
        Tuning::with_options(scale, keyboard_mapping, TuningOptions::default())
    }

    /// Constructs a `Tuning` with given `scale`, `keyboard_mapping` and `options`.
    ///
    /// Fails when the scale is empty, when the middle or tuning constant note is absurdly far
    /// from the MIDI range, when the mapping's octave degrees or any mapped key lie
    /// beyond the scale, or when the tuning constant note is unmapped and `options` do not
    /// allow it.
    pub fn with_options(
        scale: Scale,
        keyboard_mapping: KeyboardMapping,
        options: TuningOptions,
    ) -> Result<Self, BuildError> {
        let layout = KeyLayout::new(&scale, &keyboard_mapping)?;
        let k = &keyboard_mapping;

        let pitch_mod = k.tuning_pitch.log2() - 1.0;

        // Offset that lands the tuning constant note on exactly `tuning_frequency`.
        let anchor_step = k.tuning_constant_note - k.middle_note;
        let (center_offset, center_degree) = match layout.key(anchor_step) {
            Some((pitch, degree)) => (pitch - 1.0, degree),
            None if options.allow_tuning_center_on_unmapped => {
                warn!(
                    "tuning constant note {} is unmapped, centering between its neighbours",
                    k.tuning_constant_note
                );
                let pitch = layout.between_neighbours(anchor_step).unwrap_or(1.0);
                (pitch - 1.0, -1)
            }
            None => {
                return Err(BuildError::TuningCenterUnmapped {
                    note: k.tuning_constant_note,
                })
            }
        };

        let mut pitch_table = [0.0; TABLE_SIZE];
        let mut log_pitch_table = [0.0; TABLE_SIZE];
        let mut scale_degree_table = [-1; TABLE_SIZE];

        for (i, note) in (-MIDI_OFFSET..).take(TABLE_SIZE).enumerate() {
            let (pitch, degree) = if note == k.tuning_constant_note {
                (1.0, center_degree)
            } else {
                match layout.key(note - k.middle_note) {
                    Some((pitch, degree)) => (pitch - center_offset, degree),
                    None => (0.0, -1),
                }
            };

            log_pitch_table[i] = pitch + pitch_mod;
            pitch_table[i] = 2f64.powf(log_pitch_table[i]);
            scale_degree_table[i] = degree;
        }

        debug!(
            "built tuning: {} tones, {} keys, note {} at {} Hz, center offset {center_offset}",
            scale.count(),
            k.count(),
            k.tuning_constant_note,
            k.tuning_frequency
        );

        Ok(Tuning {
            scale,
            keyboard_mapping,
            options,
            pitch_table,
            log_pitch_table,
            scale_degree_table,
        })
    }

    /// Returns a copy where every unmapped note gets a pitch interpolated linearly, in log space,
    /// between the nearest mapped notes on each side. Notes beyond the last mapped note on
    /// either end take that note's pitch.
    ///
    /// Interpolated notes keep reporting `false` from [`Tuning::is_midi_note_mapped()`]; only
    /// their frequencies are filled in.
    pub fn with_skipped_notes_interpolated(&self) -> Self {
        let mut res = self.clone();
        let mapped = |i: usize| self.scale_degree_table[i] >= 0;

        for i in (0..TABLE_SIZE).filter(|&i| !mapped(i)) {
            let prv = (0..i).rev().find(|&j| mapped(j));
            let nxt = (i + 1..TABLE_SIZE).find(|&j| mapped(j));

            res.log_pitch_table[i] = match (prv, nxt) {
                (Some(prv), Some(nxt)) => {
                    let frac = (i - prv) as f64 / (nxt - prv) as f64;
                    (1.0 - frac) * self.log_pitch_table[prv] + frac * self.log_pitch_table[nxt]
                }
                (Some(j), None) | (None, Some(j)) => self.log_pitch_table[j],
                (None, None) => continue,
            };
            res.pitch_table[i] = 2f64.powf(res.log_pitch_table[i]);
        }

        res
    }

    /// The scale this tuning was built from.
    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    /// The keyboard mapping this tuning was built from.
    pub fn keyboard_mapping(&self) -> &KeyboardMapping {
        &self.keyboard_mapping
    }

    /// The options this tuning was built with.
    pub fn options(&self) -> TuningOptions {
        self.options
    }

    /// Returns the frequency in Hz for a given MIDI note.
    /// ```
    /// # use scl_tuning::*;
    /// let t = Tuning::new();
    /// assert!((t.frequency_for_midi_note(69) - 440.0).abs() < 1e-4); // A
    /// assert!((t.frequency_for_midi_note(60) - 261.6256).abs() < 1e-4); // middle C
    /// ```
    pub fn frequency_for_midi_note(&self, midi_note: i32) -> f64 {
        self.pitch_table[table_index(midi_note)] * MIDI_0_FREQ
    }

    /// Returns the frequency but with the standard frequency of MIDI note 0 divided out.
    /// ```
    /// # use scl_tuning::*;
    /// let t = Tuning::new();
    /// assert_eq!(t.frequency_for_midi_note_scaled_by_midi0(0), 1.0);
    /// assert_eq!(t.frequency_for_midi_note_scaled_by_midi0(60), 32.0);
    /// ```
    pub fn frequency_for_midi_note_scaled_by_midi0(&self, midi_note: i32) -> f64 {
        self.pitch_table[table_index(midi_note)]
    }

    /// Returns the log base 2 of the scaled frequency. The value increases by one per frequency
    /// double.
    /// ```
    /// # use scl_tuning::*;
    /// let t = Tuning::new();
    /// assert_eq!(t.log_scaled_frequency_for_midi_note(0), 0.0);
    /// assert_eq!(t.log_scaled_frequency_for_midi_note(60), 5.0);
    /// ```
    pub fn log_scaled_frequency_for_midi_note(&self, midi_note: i32) -> f64 {
        self.log_pitch_table[table_index(midi_note)]
    }

    /// Returns the space in the logical scale, or `-1` for an unmapped note. Note 0 is the root.
    /// It has a maximum value of `count-1`. Note that SCL files omit the root internally and so
    /// this logical scale position is off by 1 from the index in the tones of the Scale data.
    pub fn scale_position_for_midi_note(&self, midi_note: i32) -> i32 {
        self.scale_degree_table[table_index(midi_note)]
    }

    /// [`Tuning::scale_position_for_midi_note()`] as a [`ScaleDegree`].
    pub fn scale_degree_for_midi_note(&self, midi_note: i32) -> ScaleDegree {
        ScaleDegree::from_raw(self.scale_position_for_midi_note(midi_note))
    }

    /// Returns whether a given `midi_note` is mapped in the `Tuning`'s `KeyboardMapping`.
    pub fn is_midi_note_mapped(&self, midi_note: i32) -> bool {
        self.scale_degree_table[table_index(midi_note)] >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_saturates_at_table_edges() {
        assert_eq!(table_index(-256), 0);
        assert_eq!(table_index(0), 256);
        assert_eq!(table_index(255), TABLE_SIZE - 1);
        assert_eq!(table_index(-1000), 0);
        assert_eq!(table_index(1000), TABLE_SIZE - 1);
        assert_eq!(table_index(i32::MAX), TABLE_SIZE - 1);
        assert_eq!(table_index(i32::MIN), 0);
    }

    #[test]
    fn layout_below_middle_note_uses_floored_rounds() {
        let s = Scale::even_temperament_12_note_scale();
        let k = KeyboardMapping::new();
        let layout = KeyLayout::new(&s, &k).unwrap();

        let (pitch, degree) = layout.key(-1).unwrap();
        assert!((pitch - (1.0 - 1.0 / 12.0)).abs() < 1e-12);
        assert_eq!(degree, 11);

        let (pitch, degree) = layout.key(-12).unwrap();
        assert!((pitch - 0.0).abs() < 1e-12);
        assert_eq!(degree, 0);
    }

    #[test]
    fn empty_scale_is_rejected() {
        let err = Tuning::from_scale(Scale::new()).unwrap_err();
        assert_eq!(err, BuildError::EmptyScale);
    }

    #[test]
    fn anchor_on_degree_zero_of_a_short_key_table() {
        // one key per formal octave of 7 degrees, anchored on that key
        let k = KeyboardMapping::parse_kbm_data("1\n0\n127\n60\n60\n261.6\n7\n0\n").unwrap();
        let t = Tuning::from_keyboard_mapping(k).unwrap();

        let f = |note| t.frequency_for_midi_note(note);
        assert!((f(60) - 261.6).abs() < 1e-9);
        assert!((f(61) / f(60) - 2.0).abs() < 1e-9);
        assert!((f(60) / f(59) - 2.0).abs() < 1e-9);
        assert_eq!(t.scale_position_for_midi_note(60), 7);
        assert_eq!(t.scale_position_for_midi_note(61), 7);
    }

    #[test]
    fn extreme_notes_are_rejected() {
        let data = "0\n0\n127\n2147483647\n60\n440.0\n0\n";
        let k = KeyboardMapping::parse_kbm_data(data).unwrap();
        let err = Tuning::from_keyboard_mapping(k).unwrap_err();
        assert_eq!(err, BuildError::NoteOutOfRange { note: i32::MAX });

        let k = KeyboardMapping::tune_note_to(i32::MIN, 440.0);
        let err = Tuning::from_keyboard_mapping(k).unwrap_err();
        assert_eq!(err, BuildError::NoteOutOfRange { note: i32::MIN });

        let k = KeyboardMapping::start_scale_on_and_tune_note_to(NOTE_LIMIT, -NOTE_LIMIT, 440.0);
        assert!(Tuning::from_keyboard_mapping(k).is_ok());
    }

    #[test]
    fn unmapped_entries_are_zero_pitch() {
        let k =
            KeyboardMapping::parse_kbm_data("2\n0\n127\n60\n60\n261.625565\n0\n0\nx\n").unwrap();
        let t = Tuning::from_keyboard_mapping(k).unwrap();
        let pitch_mod = t.keyboard_mapping().tuning_pitch.log2() - 1.0;

        assert!(!t.is_midi_note_mapped(61));
        assert_eq!(t.scale_degree_for_midi_note(61), ScaleDegree::Unmapped);
        assert_eq!(t.log_scaled_frequency_for_midi_note(61), pitch_mod);
    }
}
