//! Cue files and the cue library
//!
//! A cue is a short audio clip in the cue folder. Its file name may carry an
//! expiry date and a selection weight:
//!
//! ```text
//! [YYYYMMDD]<any text>[_w<weight>].<mp3|wav|ogg>
//! ```
//!
//! Files without a date prefix never expire; files without a weight suffix
//! have weight 1.

mod library;

pub use library::{select_cue, select_cue_with, CueLibrary};

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use tracing::debug;

/// Extensions recognized as cue audio (compared case-insensitively)
pub const AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "wav", "ogg"];

/// Marker that introduces the weight suffix in a file stem
const WEIGHT_MARKER: &str = "_w";

/// Number of leading digits that form the expiry date
const DATE_PREFIX_LEN: usize = 8;

/// Last day a cue may be played, as a `YYYYMMDD` number
///
/// Kept numeric rather than as a calendar date so that prefixes which are not
/// real dates still order the same way a plain string comparison would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpiryStamp(u32);

impl ExpiryStamp {
    /// Stamp for a calendar date
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.year() as u32 * 10_000 + date.month() * 100 + date.day())
    }

    /// Parse the leading 8-digit date of a file name
    ///
    /// The name must be longer than the prefix itself.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let prefix = name.get(..DATE_PREFIX_LEN)?;
        if name.len() <= DATE_PREFIX_LEN || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        prefix.parse().ok().map(Self)
    }

    /// Whether a cue with this stamp may still play on `today`
    pub fn is_valid_on(&self, today: NaiveDate) -> bool {
        *self >= Self::from_date(today)
    }
}

impl fmt::Display for ExpiryStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

/// One selectable cue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueFile {
    /// Location of the audio file
    pub path: PathBuf,
    /// Last playable day, `None` for permanent cues
    pub expiry: Option<ExpiryStamp>,
    /// Relative selection weight, at least 1
    pub weight: u32,
}

impl CueFile {
    /// Build a cue from its path, parsing expiry and weight from the file name
    ///
    /// Returns `None` if the path has no file name or the extension is not a
    /// recognized audio type.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        if !has_audio_extension(&path) {
            return None;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            debug!(path = %path.display(), "Skipping cue with a non UTF-8 file name");
            return None;
        };
        let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);

        Some(Self {
            expiry: ExpiryStamp::from_file_name(name),
            weight: parse_weight(stem),
            path,
        })
    }

    /// File name of the cue, for logging
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether the cue never expires
    pub fn is_permanent(&self) -> bool {
        self.expiry.is_none()
    }

    /// Whether the cue may play on `today`
    pub fn is_eligible_on(&self, today: NaiveDate) -> bool {
        self.expiry.map_or(true, |stamp| stamp.is_valid_on(today))
    }
}

/// Whether the path ends in one of [`AUDIO_EXTENSIONS`]
///
/// Matched on the end of the file name, case-insensitively, so `.mp3` on its
/// own counts as well.
pub fn has_audio_extension(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| {
            name.rsplit_once('.')
                .map(|(_, ext)| AUDIO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        })
        .unwrap_or(false)
}

/// Weight encoded as a trailing `_w<digits>` in a file stem
///
/// Defaults to 1 when absent; zero is clamped up to 1 and values too large
/// for `u32` saturate.
pub fn parse_weight(stem: &str) -> u32 {
    let digit_count = stem.bytes().rev().take_while(u8::is_ascii_digit).count();
    if digit_count == 0 {
        return 1;
    }

    let (head, digits) = stem.split_at(stem.len() - digit_count);
    if !head.ends_with(WEIGHT_MARKER) {
        return 1;
    }

    digits.parse::<u32>().unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bare_extension_is_a_cue() {
        let cue = CueFile::from_path("Cunas/.mp3").unwrap();
        assert_eq!(cue.weight, 1);
        assert!(cue.is_permanent());
        assert!(CueFile::from_path("Cunas/PROMO_W2.OGG").is_some());
        assert!(CueFile::from_path("Cunas/mp3").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("Cunas").join(OsStr::from_bytes(b"promo\xff.mp3"));
        assert!(has_audio_extension(&path));
        assert!(CueFile::from_path(path).is_none());
    }

    #[test]
    fn test_weight_parsing() {
        assert_eq!(parse_weight("promo"), 1);
        assert_eq!(parse_weight("promo_w5"), 5);
        assert_eq!(parse_weight("20250101 summer sale_w12"), 12);
        assert_eq!(parse_weight("promo_w0"), 1);
        assert_eq!(parse_weight("promo_w007"), 7);
    }

    #[test]
    fn test_weight_marker_must_be_trailing() {
        assert_eq!(parse_weight("promo_w5_final"), 1);
        assert_eq!(parse_weight("promo5"), 1);
        assert_eq!(parse_weight("promo_w"), 1);
        assert_eq!(parse_weight("promo_x5"), 1);
        // A negative number is not digits after the marker
        assert_eq!(parse_weight("promo_w-3"), 1);
    }

    #[test]
    fn test_huge_weight_saturates() {
        assert_eq!(parse_weight("promo_w99999999999999"), u32::MAX);
    }

    #[test]
    fn test_expiry_prefix() {
        assert_eq!(
            ExpiryStamp::from_file_name("20251231_promo.mp3"),
            Some(ExpiryStamp(20251231))
        );
        assert_eq!(ExpiryStamp::from_file_name("promo.mp3"), None);
        assert_eq!(ExpiryStamp::from_file_name("2025123_promo.mp3"), None);
        assert_eq!(ExpiryStamp::from_file_name("20251231"), None);
        assert_eq!(ExpiryStamp::from_file_name("ñ"), None);
    }

    #[test]
    fn test_expiry_boundaries() {
        let today = date(2025, 6, 15);
        assert!(ExpiryStamp::from_date(today).is_valid_on(today));
        assert!(ExpiryStamp::from_date(date(2025, 6, 16)).is_valid_on(today));
        assert!(!ExpiryStamp::from_date(date(2025, 6, 14)).is_valid_on(today));
    }

    #[test]
    fn test_expiry_display() {
        assert_eq!(ExpiryStamp::from_date(date(2024, 3, 5)).to_string(), "20240305");
    }

    #[test]
    fn test_cue_from_path() {
        let cue = CueFile::from_path("/cues/20300101_promoA_w2.mp3").unwrap();
        assert_eq!(cue.expiry, Some(ExpiryStamp(20300101)));
        assert_eq!(cue.weight, 2);
        assert_eq!(cue.file_name(), "20300101_promoA_w2.mp3");

        let cue = CueFile::from_path("/cues/jingle.OGG").unwrap();
        assert!(cue.is_permanent());
        assert_eq!(cue.weight, 1);

        assert!(CueFile::from_path("/cues/notes.txt").is_none());
        assert!(CueFile::from_path("/cues/noext").is_none());
    }

    #[test]
    fn test_permanent_cue_always_eligible() {
        let cue = CueFile::from_path("promo.wav").unwrap();
        assert!(cue.is_eligible_on(date(1970, 1, 1)));
        assert!(cue.is_eligible_on(date(2999, 12, 31)));
    }
}
