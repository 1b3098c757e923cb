//! Extractor configuration.

use crate::classifier::DEFAULT_OMITTABLE_TAGS;

/// What to do with an opening bracket that is never closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UnterminatedPolicy {
    /// Fail extraction with [`TokenizeError::Unterminated`](crate::TokenizeError::Unterminated).
    #[default]
    Error,
    /// Treat everything after the bracket as its content.
    Truncate,
}

/// Configuration for [`NameExtractor`](crate::NameExtractor).
///
/// ```
/// use animencode_parser::config::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .known_omittable_tags(["HEVC", "FLAC"])
///     .tag_splitter(" ")
///     .build();
///
/// assert_eq!(config.tag_splitter.as_deref(), Some(" "));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractorConfig {
    /// Tags that are regenerated by an encode and may be dropped on rename.
    /// Compared case-insensitively against whole tag contents.
    /// Default: HEVC, AAC, OPUS
    pub known_omittable_tags: Vec<String>,

    /// Split every bracketed tag by this separator before classifying.
    /// Default: None
    pub tag_splitter: Option<String>,

    /// Treat `[...]` as a tag delimiter.
    /// Default: true
    pub square_brackets: bool,

    /// Treat `(...)` as a tag delimiter.
    /// Default: true
    pub round_brackets: bool,

    /// Handling of unclosed brackets.
    /// Default: Error
    pub unterminated: UnterminatedPolicy,

    /// Strip a recognized video extension before tokenizing.
    /// Default: true
    pub strip_extension: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        let mut known: Vec<String> = DEFAULT_OMITTABLE_TAGS
            .iter()
            .map(|tag| tag.to_string())
            .collect();
        known.sort();
        Self {
            known_omittable_tags: known,
            tag_splitter: None,
            square_brackets: true,
            round_brackets: true,
            unterminated: UnterminatedPolicy::default(),
            strip_extension: true,
        }
    }
}

impl ExtractorConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder::default()
    }
}

/// Builder for `ExtractorConfig`.
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfigBuilder {
    known_omittable_tags: Option<Vec<String>>,
    tag_splitter: Option<String>,
    square_brackets: Option<bool>,
    round_brackets: Option<bool>,
    unterminated: Option<UnterminatedPolicy>,
    strip_extension: Option<bool>,
}

impl ExtractorConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known-omittable tag set.
    pub fn known_omittable_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_omittable_tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Split bracketed tags by `splitter` before classification.
    ///
    /// With `" "`, `[BD 1080p FLAC]` is classified as three tags.
    pub fn tag_splitter(mut self, splitter: impl Into<String>) -> Self {
        self.tag_splitter = Some(splitter.into());
        self
    }

    /// Enable or disable `[...]` tags.
    pub fn square_brackets(mut self, enabled: bool) -> Self {
        self.square_brackets = Some(enabled);
        self
    }

    /// Enable or disable `(...)` tags.
    pub fn round_brackets(mut self, enabled: bool) -> Self {
        self.round_brackets = Some(enabled);
        self
    }

    /// Set the unclosed bracket policy.
    pub fn unterminated(mut self, policy: UnterminatedPolicy) -> Self {
        self.unterminated = Some(policy);
        self
    }

    /// Set whether to strip video file extensions.
    ///
    /// Default: true
    pub fn strip_extension(mut self, enabled: bool) -> Self {
        self.strip_extension = Some(enabled);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ExtractorConfig {
        let defaults = ExtractorConfig::default();
        ExtractorConfig {
            known_omittable_tags: self
                .known_omittable_tags
                .unwrap_or(defaults.known_omittable_tags),
            tag_splitter: self.tag_splitter.filter(|s| !s.is_empty()),
            square_brackets: self.square_brackets.unwrap_or(defaults.square_brackets),
            round_brackets: self.round_brackets.unwrap_or(defaults.round_brackets),
            unterminated: self.unterminated.unwrap_or(defaults.unterminated),
            strip_extension: self.strip_extension.unwrap_or(defaults.strip_extension),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractorConfig::default();
        assert_eq!(config.known_omittable_tags, vec!["AAC", "HEVC", "OPUS"]);
        assert!(config.tag_splitter.is_none());
        assert!(config.square_brackets);
        assert!(config.round_brackets);
        assert_eq!(config.unterminated, UnterminatedPolicy::Error);
        assert!(config.strip_extension);
    }

    #[test]
    fn test_builder() {
        let config = ExtractorConfig::builder()
            .known_omittable_tags(["flac"])
            .round_brackets(false)
            .unterminated(UnterminatedPolicy::Truncate)
            .build();

        assert_eq!(config.known_omittable_tags, vec!["flac"]);
        assert!(config.square_brackets);
        assert!(!config.round_brackets);
        assert_eq!(config.unterminated, UnterminatedPolicy::Truncate);
    }

    #[test]
    fn test_empty_splitter_is_ignored() {
        let config = ExtractorConfig::builder().tag_splitter("").build();
        assert!(config.tag_splitter.is_none());
    }
}
