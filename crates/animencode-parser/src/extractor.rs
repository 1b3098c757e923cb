//! Filename metadata extraction.
//!
//! Walks the segments of a filename stem once. The first segment names the
//! release group; later free text forms the episode title and later tags
//! are routed through the [`TagClassifier`].

use std::borrow::Cow;
use std::path::Path;

use crate::classifier::{TagClass, TagClassifier};
use crate::config::ExtractorConfig;
use crate::model::{SourceMetadata, UNKNOWN_RELEASE_GROUP};
use crate::tokenizer::{TagTokenizer, TokenizeError};

/// Extensions removed before tokenizing (compared case-insensitively).
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "webm", "m4v", "mov", "ts", "m2ts", "flv", "wmv",
];

/// Extracts [`SourceMetadata`] from filenames.
#[derive(Debug, Clone)]
pub struct NameExtractor {
    config: ExtractorConfig,
    tokenizer: TagTokenizer,
    classifier: TagClassifier,
}

impl Default for NameExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl NameExtractor {
    /// Create an extractor with the given configuration.
    pub fn new(config: ExtractorConfig) -> Self {
        let tokenizer = TagTokenizer::new(
            config.square_brackets,
            config.round_brackets,
            config.unterminated,
        );
        let classifier = TagClassifier::new(&config.known_omittable_tags);
        Self {
            config,
            tokenizer,
            classifier,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract metadata from the final component of `path`.
    pub fn extract_path(&self, path: &Path) -> Result<SourceMetadata, TokenizeError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        self.extract(&name)
    }

    /// Extract metadata from a bare filename.
    ///
    /// ```
    /// use animencode_parser::NameExtractor;
    ///
    /// let meta = NameExtractor::default()
    ///     .extract("[SubsPlease] Slow Loop - 07 (1080p) [840BACEC].mkv")
    ///     .unwrap();
    ///
    /// assert_eq!(meta.release_group.as_deref(), Some("SubsPlease"));
    /// assert_eq!(meta.episode_title, "Slow Loop - 07");
    /// assert_eq!(meta.resolution, Some(1080));
    /// assert_eq!(meta.crc32_from_name.as_deref(), Some("840BACEC"));
    /// ```
    pub fn extract(&self, file_name: &str) -> Result<SourceMetadata, TokenizeError> {
        let mut meta = SourceMetadata::new(file_name);
        let stem = if self.config.strip_extension {
            strip_extension(file_name)
        } else {
            file_name
        };

        let mut segments = self.tokenizer.segments(stem);
        let Some(first) = segments.next().transpose()? else {
            return Ok(meta);
        };

        let offset = segments.offset();
        let rest: Cow<'_, str> = if first.is_text() {
            // Group-less names use underscores as word separators.
            meta.release_group = Some(UNKNOWN_RELEASE_GROUP.to_string());
            meta.push_title(first.content.replace('_', " ").trim());
            Cow::Owned(segments.remainder().replace('_', " "))
        } else {
            meta.release_group = Some(first.content.to_string());
            Cow::Borrowed(segments.remainder())
        };

        for segment in self.tokenizer.segments(&rest).with_offset(offset) {
            let segment = segment?;
            if segment.is_text() {
                meta.push_title(segment.content);
            } else {
                self.route_tag(&mut meta, segment.content);
            }
        }

        Ok(meta)
    }

    fn route_tag(&self, meta: &mut SourceMetadata, content: &str) {
        match self.config.tag_splitter.as_deref() {
            Some(splitter) => {
                for part in content
                    .split(splitter)
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                {
                    self.route_part(meta, part);
                }
            }
            None => self.route_part(meta, content),
        }
    }

    fn route_part(&self, meta: &mut SourceMetadata, part: &str) {
        match self.classifier.classify(part) {
            TagClass::KnownOmittable => {
                meta.omittable_tags.insert(part);
            }
            TagClass::Crc32 if meta.crc32_from_name.is_none() => {
                meta.crc32_from_name = Some(part.to_string());
            }
            TagClass::Crc32 | TagClass::Other => {
                meta.non_omittable_tags.insert(part);
            }
            TagClass::Resolution(found) => {
                meta.omittable_tags.insert(found.token);
                if meta.resolution.is_none() {
                    meta.resolution = Some(found.value);
                }
                if let Some(rest) = found.remainder {
                    meta.non_omittable_tags.insert(rest);
                }
            }
        }
    }
}

/// Remove a trailing video extension, if any.
///
/// ```
/// use animencode_parser::extractor::strip_extension;
///
/// assert_eq!(strip_extension("Episode 01.MKV"), "Episode 01");
/// assert_eq!(strip_extension("Episode 01.srt"), "Episode 01.srt");
/// ```
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && VIDEO_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext)) =>
        {
            stem
        }
        _ => file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnterminatedPolicy;

    fn extract(name: &str) -> SourceMetadata {
        NameExtractor::default().extract(name).unwrap()
    }

    #[test]
    fn test_subsplease_release() {
        let meta = extract("[SubsPlease] Slow Loop - 07 (1080p) [840BACEC].mkv");
        assert_eq!(meta.file_name, "[SubsPlease] Slow Loop - 07 (1080p) [840BACEC].mkv");
        assert_eq!(meta.release_group.as_deref(), Some("SubsPlease"));
        assert_eq!(meta.episode_title, "Slow Loop - 07");
        assert_eq!(meta.resolution, Some(1080));
        assert_eq!(meta.crc32_from_name.as_deref(), Some("840BACEC"));
        assert_eq!(meta.omittable_tags.as_slice(), ["1080p"]);
        assert!(meta.non_omittable_tags.is_empty());
    }

    #[test]
    fn test_title_only() {
        let meta = extract("Title Only.mkv");
        assert_eq!(meta.release_group.as_deref(), Some(UNKNOWN_RELEASE_GROUP));
        assert!(meta.has_unknown_group());
        assert_eq!(meta.episode_title, "Title Only");
        assert!(meta.omittable_tags.is_empty());
        assert!(meta.non_omittable_tags.is_empty());
        assert_eq!(meta.crc32_from_name, None);
        assert_eq!(meta.resolution, None);
    }

    #[test]
    fn test_unknown_group_replaces_underscores() {
        let meta = extract("Some_Show_-_01_[BD_1080p].mkv");
        assert_eq!(meta.release_group.as_deref(), Some(UNKNOWN_RELEASE_GROUP));
        assert_eq!(meta.episode_title, "Some Show - 01");
        assert_eq!(meta.resolution, Some(1080));
        assert_eq!(meta.omittable_tags.as_slice(), ["1080p"]);
        assert_eq!(meta.non_omittable_tags.as_slice(), ["BD"]);
    }

    #[test]
    fn test_group_underscores_kept() {
        let meta = extract("[Selection_Project] Show - 01.mkv");
        assert_eq!(meta.release_group.as_deref(), Some("Selection_Project"));
    }

    #[test]
    fn test_every_tag_lands_in_one_bucket() {
        let meta = extract("[Group] Show - 12 [BD] [HEVC] [aac] [1920x1080] [ABCDEF01] [Dual Audio].mkv");
        assert_eq!(meta.release_group.as_deref(), Some("Group"));
        assert_eq!(meta.episode_title, "Show - 12");
        assert_eq!(meta.crc32_from_name.as_deref(), Some("ABCDEF01"));
        assert_eq!(meta.omittable_tags.as_slice(), ["HEVC", "aac", "1920x1080"]);
        assert_eq!(meta.non_omittable_tags.as_slice(), ["BD", "Dual Audio"]);
        assert_eq!(meta.resolution, Some(1080));
    }

    #[test]
    fn test_first_resolution_wins() {
        let meta = extract("[G] Show [720p] [1080p]");
        assert_eq!(meta.resolution, Some(720));
        assert_eq!(meta.omittable_tags.as_slice(), ["720p", "1080p"]);
    }

    #[test]
    fn test_second_crc_is_kept_as_tag() {
        let meta = extract("[G] Show [AAAAAAAA] [BBBBBBBB]");
        assert_eq!(meta.crc32_from_name.as_deref(), Some("AAAAAAAA"));
        assert_eq!(meta.non_omittable_tags.as_slice(), ["BBBBBBBB"]);
    }

    #[test]
    fn test_resolution_remainder_is_non_omittable() {
        let meta = extract("[G] Show [1080p.x265]");
        assert_eq!(meta.omittable_tags.as_slice(), ["1080p"]);
        assert_eq!(meta.non_omittable_tags.as_slice(), ["x265"]);
    }

    #[test]
    fn test_free_text_between_tags() {
        let meta = extract("[G] Show [BD] Part 2 (OVA)");
        assert_eq!(meta.episode_title, "Show Part 2");
        assert_eq!(meta.non_omittable_tags.as_slice(), ["BD", "OVA"]);
    }

    #[test]
    fn test_tag_splitter() {
        let extractor =
            NameExtractor::new(ExtractorConfig::builder().tag_splitter(" ").build());
        let meta = extractor
            .extract("[G] Show - 01 [BD 1080p HEVC FLAC].mkv")
            .unwrap();
        assert_eq!(meta.omittable_tags.as_slice(), ["1080p", "HEVC"]);
        assert_eq!(meta.non_omittable_tags.as_slice(), ["BD", "FLAC"]);
    }

    #[test]
    fn test_unknown_extension_kept() {
        let meta = extract("[G] Show - 01.srt");
        assert_eq!(meta.episode_title, "Show - 01.srt");
    }

    #[test]
    fn test_empty_name() {
        let meta = extract("");
        assert_eq!(meta.release_group, None);
        assert!(meta.episode_title.is_empty());
    }

    #[test]
    fn test_unterminated_error_offset() {
        let err = NameExtractor::default()
            .extract("[G] Show [1080p.mkv")
            .unwrap_err();
        assert_eq!(
            err,
            TokenizeError::Unterminated {
                bracket: '[',
                offset: 9
            }
        );
    }

    #[test]
    fn test_unterminated_truncate() {
        let extractor = NameExtractor::new(
            ExtractorConfig::builder()
                .unterminated(UnterminatedPolicy::Truncate)
                .build(),
        );
        let meta = extractor.extract("[G] Show [1080p.mkv").unwrap();
        assert_eq!(meta.resolution, Some(1080));
    }

    #[test]
    fn test_extract_path_uses_file_name() {
        let meta = NameExtractor::default()
            .extract_path(Path::new("/media/anime/[G] Show - 03.mkv"))
            .unwrap();
        assert_eq!(meta.file_name, "[G] Show - 03.mkv");
        assert_eq!(meta.episode_title, "Show - 03");
    }
}
