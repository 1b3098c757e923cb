//! Classification of bracketed tag contents.
//!
//! Each tag is tested in a fixed order and lands in exactly one class:
//!
//! 1. known omittable (case-insensitive exact match against a configured set)
//! 2. CRC32 (exactly eight hex digits)
//! 3. resolution (`1080p`, `480i`, `1920x1080`, possibly embedded in a longer tag)
//! 4. anything else

use std::collections::BTreeSet;
use std::sync::LazyLock;

use phf::phf_set;
use regex::Regex;

/// Tags dropped on rename unless the caller supplies its own set.
pub static DEFAULT_OMITTABLE_TAGS: phf::Set<&'static str> = phf_set! {
    "HEVC",
    "AAC",
    "OPUS",
};

static PROGRESSIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)[pPiI]").expect("valid regex"));
static DIMENSIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+[xX]([0-9]+)").expect("valid regex"));

/// Outcome of classifying one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagClass {
    /// Matched the known-omittable set.
    KnownOmittable,
    /// Eight hex digits.
    Crc32,
    /// Contains a resolution marker.
    Resolution(ResolutionMatch),
    /// Nothing recognizable; kept across re-encodes.
    Other,
}

/// A resolution marker found inside a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionMatch {
    /// The matched marker, e.g. `1080p` or `1920x1080`.
    pub token: String,
    /// Line count: the digits before `p`/`i`, or the height of `WxH`.
    pub value: u32,
    /// What is left of the tag once the marker and one adjacent separator
    /// are removed, if anything.
    pub remainder: Option<String>,
}

/// Classifies tag contents against a known-omittable set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagClassifier {
    known_omittable: BTreeSet<String>,
}

impl Default for TagClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_OMITTABLE_TAGS.iter().copied())
    }
}

impl TagClassifier {
    /// Create a classifier. Tags are stored upper-cased.
    pub fn new<I, S>(known_omittable: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            known_omittable: known_omittable
                .into_iter()
                .map(|tag| tag.as_ref().to_uppercase())
                .collect(),
        }
    }

    /// Whether `content` is in the known-omittable set.
    pub fn is_known_omittable(&self, content: &str) -> bool {
        self.known_omittable.contains(&content.to_uppercase())
    }

    /// Classify one tag.
    ///
    /// ```
    /// use animencode_parser::classifier::{TagClass, TagClassifier};
    ///
    /// let classifier = TagClassifier::default();
    /// assert_eq!(classifier.classify("hevc"), TagClass::KnownOmittable);
    /// assert_eq!(classifier.classify("840BACEC"), TagClass::Crc32);
    /// assert_eq!(classifier.classify("WEB-DL"), TagClass::Other);
    /// ```
    pub fn classify(&self, content: &str) -> TagClass {
        if self.is_known_omittable(content) {
            TagClass::KnownOmittable
        } else if is_crc32(content) {
            TagClass::Crc32
        } else if let Some(found) = find_resolution(content) {
            TagClass::Resolution(found)
        } else {
            TagClass::Other
        }
    }
}

/// Exactly eight ASCII hex digits.
pub fn is_crc32(content: &str) -> bool {
    content.len() == 8 && content.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Find the first resolution marker in `content`.
///
/// `NNNp`/`NNNi` is tried before `WxH`.
pub fn find_resolution(content: &str) -> Option<ResolutionMatch> {
    for re in [&*PROGRESSIVE_RE, &*DIMENSIONS_RE] {
        let Some(caps) = re.captures(content) else {
            continue;
        };
        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Ok(value) = digits.as_str().parse::<u32>() else {
            continue;
        };

        let remainder = strip_match(content, whole.start(), whole.end());
        return Some(ResolutionMatch {
            token: whole.as_str().to_string(),
            value,
            remainder: (!remainder.is_empty()).then_some(remainder),
        });
    }
    None
}

/// Remove `content[start..end]` along with the separator that joined it to
/// the rest of the tag: the following character when the marker leads or
/// sits in the middle, the preceding one when it trails.
fn strip_match(content: &str, start: usize, end: usize) -> String {
    let after_sep = |idx: usize| {
        content[idx..]
            .chars()
            .next()
            .map_or(idx, |c| idx + c.len_utf8())
    };

    if start == 0 && end == content.len() {
        String::new()
    } else if start == 0 {
        content[after_sep(end)..].to_string()
    } else if end == content.len() {
        let before = &content[..start];
        let cut = before.char_indices().last().map_or(0, |(i, _)| i);
        before[..cut].to_string()
    } else {
        let mut rest = content[..start].to_string();
        rest.push_str(&content[after_sep(end)..]);
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolution(content: &str) -> ResolutionMatch {
        match TagClassifier::default().classify(content) {
            TagClass::Resolution(found) => found,
            other => panic!("{content:?} classified as {other:?}"),
        }
    }

    #[test]
    fn test_known_omittable_is_case_insensitive() {
        let classifier = TagClassifier::default();
        assert_eq!(classifier.classify("HEVC"), TagClass::KnownOmittable);
        assert_eq!(classifier.classify("Opus"), TagClass::KnownOmittable);
        assert_eq!(classifier.classify("HEVC AAC"), TagClass::Other);
    }

    #[test]
    fn test_custom_known_set() {
        let classifier = TagClassifier::new(["flac"]);
        assert_eq!(classifier.classify("FLAC"), TagClass::KnownOmittable);
        assert_eq!(classifier.classify("HEVC"), TagClass::Other);
    }

    #[test]
    fn test_known_tag_wins_over_patterns() {
        let classifier = TagClassifier::new(["Hi10P", "DEADBEEF"]);
        assert_eq!(classifier.classify("Hi10P"), TagClass::KnownOmittable);
        assert_eq!(classifier.classify("deadbeef"), TagClass::KnownOmittable);
    }

    #[test]
    fn test_crc32() {
        assert!(is_crc32("840BACEC"));
        assert!(is_crc32("840bacec"));
        assert!(!is_crc32("840BACE"));
        assert!(!is_crc32("840BACEG"));
        assert!(!is_crc32("840BACEC0"));
    }

    #[test]
    fn test_whole_resolution() {
        let found = resolution("1080p");
        assert_eq!(found.token, "1080p");
        assert_eq!(found.value, 1080);
        assert_eq!(found.remainder, None);

        assert_eq!(resolution("480i").value, 480);
        assert_eq!(resolution("720P").value, 720);
    }

    #[test]
    fn test_dimensions() {
        let found = resolution("1920x1080");
        assert_eq!(found.token, "1920x1080");
        assert_eq!(found.value, 1080);
        assert_eq!(found.remainder, None);
    }

    #[test]
    fn test_resolution_at_start() {
        let found = resolution("1080p.x265");
        assert_eq!(found.token, "1080p");
        assert_eq!(found.remainder.as_deref(), Some("x265"));
    }

    #[test]
    fn test_resolution_at_end() {
        let found = resolution("AAC-720P");
        assert_eq!(found.value, 720);
        assert_eq!(found.remainder.as_deref(), Some("AAC"));
    }

    #[test]
    fn test_resolution_in_middle() {
        let found = resolution("WEB 1080p HEVC");
        assert_eq!(found.value, 1080);
        assert_eq!(found.remainder.as_deref(), Some("WEB HEVC"));
    }

    #[test]
    fn test_progressive_preferred_over_dimensions() {
        let found = resolution("1280x720p");
        assert_eq!(found.token, "720p");
        assert_eq!(found.value, 720);
    }

    #[test]
    fn test_no_resolution() {
        assert_eq!(TagClassifier::default().classify("WEB-DL"), TagClass::Other);
        assert_eq!(TagClassifier::default().classify("x264"), TagClass::Other);
        assert_eq!(find_resolution("BD"), None);
    }
}
