//! # animencode-parser
//!
//! Tag parser for anime scene-release filenames.
//!
//! Fansub and scene releases pack their metadata into bracketed tags around
//! a free-text title:
//!
//! ```text
//! [SubsPlease] Slow Loop - 07 (1080p) [840BACEC].mkv
//!  ^ group     ^ episode title  ^ res   ^ CRC32
//! ```
//!
//! This crate splits such names into segments, classifies every tag and
//! returns a [`SourceMetadata`].
//!
//! ## Quick Start
//!
//! ```
//! use animencode_parser::extract;
//!
//! let meta = extract("[SubsPlease] Slow Loop - 07 (1080p) [840BACEC].mkv").unwrap();
//!
//! assert_eq!(meta.release_group.as_deref(), Some("SubsPlease"));
//! assert_eq!(meta.episode_title, "Slow Loop - 07");
//! assert_eq!(meta.resolution, Some(1080));
//! ```
//!
//! ## Configurable Extraction
//!
//! ```
//! use animencode_parser::NameExtractor;
//! use animencode_parser::config::ExtractorConfig;
//!
//! let config = ExtractorConfig::builder()
//!     .known_omittable_tags(["HEVC", "FLAC"])
//!     .tag_splitter(" ")
//!     .build();
//!
//! let meta = NameExtractor::new(config)
//!     .extract("[Group] Show - 01 [BD 1080p FLAC].mkv")
//!     .unwrap();
//!
//! assert_eq!(meta.non_omittable_tags.as_slice(), ["BD"]);
//! ```

pub mod classifier;
pub mod config;
pub mod extractor;
pub mod model;
pub mod tokenizer;

pub use classifier::{TagClass, TagClassifier, DEFAULT_OMITTABLE_TAGS};
pub use config::{ExtractorConfig, UnterminatedPolicy};
pub use extractor::NameExtractor;
pub use model::{SourceMetadata, TagSet, UNKNOWN_RELEASE_GROUP};
pub use tokenizer::{Segment, SegmentKind, TagTokenizer, TokenizeError};

/// Extract metadata from a filename using default settings.
///
/// For more control, use [`NameExtractor`] with a custom [`ExtractorConfig`].
pub fn extract(file_name: &str) -> Result<SourceMetadata, TokenizeError> {
    NameExtractor::default().extract(file_name)
}
