//! Extraction results.

use std::fmt;

/// Release group recorded when the name does not start with a bracketed tag.
pub const UNKNOWN_RELEASE_GROUP: &str = "UNKNOWN";

/// Insertion-ordered set of tag strings.
///
/// Iteration order is first appearance in the filename, so joined output is
/// stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TagSet(Vec<String>);

impl TagSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag. Returns false if it was already present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Join all tags with `divider`.
    pub fn join(&self, divider: &str) -> String {
        self.0.join(divider)
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

/// Metadata recovered from a scene-release filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceMetadata {
    /// The name as given to the extractor.
    pub file_name: String,

    /// Content of the first bracketed segment, or [`UNKNOWN_RELEASE_GROUP`]
    /// when the name starts with free text. `None` only for empty names.
    pub release_group: Option<String>,

    /// Free-text segments joined by single spaces.
    pub episode_title: String,

    /// Tags the encode regenerates (resolution markers, known codecs).
    pub omittable_tags: TagSet,

    /// Provenance tags preserved across re-encodes.
    pub non_omittable_tags: TagSet,

    /// Eight hex digits found in a tag, case preserved.
    pub crc32_from_name: Option<String>,

    /// First resolution value seen, e.g. 1080.
    pub resolution: Option<u32>,
}

impl SourceMetadata {
    pub(crate) fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn push_title(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.episode_title.is_empty() {
            self.episode_title.push(' ');
        }
        self.episode_title.push_str(text);
    }

    /// Whether the release group is the [`UNKNOWN_RELEASE_GROUP`] sentinel.
    pub fn has_unknown_group(&self) -> bool {
        self.release_group.as_deref() == Some(UNKNOWN_RELEASE_GROUP)
    }
}

impl fmt::Display for SourceMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File:          {}", self.file_name)?;
        writeln!(
            f,
            "Release group: {}",
            self.release_group.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "Episode:       {}", self.episode_title)?;
        match self.resolution {
            Some(res) => writeln!(f, "Resolution:    {}", res)?,
            None => writeln!(f, "Resolution:    -")?,
        }
        writeln!(
            f,
            "CRC32:         {}",
            self.crc32_from_name.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "Omittable:     {}", self.omittable_tags.join(", "))?;
        write!(f, "Other tags:    {}", self.non_omittable_tags.join(", "))
    }
}
