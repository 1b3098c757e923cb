use animencode_parser::{ExtractorConfig, UnterminatedPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub encode: EncodeConfig,

    #[serde(default)]
    pub parser: ParserConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncodeConfig {
    /// Directory encoded files are written to (overridden by `encode -o`)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Preset directory used when `encode --preset` is not given
    #[serde(default)]
    pub preset_dir: Option<PathBuf>,

    /// Compare each source's CRC32 with the checksum tag in its name
    #[serde(default = "default_true")]
    pub verify_source: bool,

    /// Echo ffmpeg output instead of only reporting progress
    #[serde(default)]
    pub show_ffmpeg_output: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            preset_dir: None,
            verify_source: true,
            show_ffmpeg_output: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParserConfig {
    #[serde(default = "default_omittable_tags")]
    pub known_omittable_tags: Vec<String>,

    /// Split bracketed tags holding several values, e.g. `[BD 1080p FLAC]`
    #[serde(default)]
    pub tag_splitter: Option<String>,

    #[serde(default = "default_true")]
    pub square_brackets: bool,

    #[serde(default = "default_true")]
    pub round_brackets: bool,

    #[serde(default)]
    pub unterminated: UnterminatedPolicy,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            known_omittable_tags: default_omittable_tags(),
            tag_splitter: None,
            square_brackets: true,
            round_brackets: true,
            unterminated: UnterminatedPolicy::default(),
        }
    }
}

impl ParserConfig {
    /// Build the extractor configuration for this table.
    pub fn extractor_config(&self) -> ExtractorConfig {
        let mut builder = ExtractorConfig::builder()
            .known_omittable_tags(&self.known_omittable_tags)
            .square_brackets(self.square_brackets)
            .round_brackets(self.round_brackets)
            .unterminated(self.unterminated);
        if let Some(splitter) = &self.tag_splitter {
            builder = builder.tag_splitter(splitter.as_str());
        }
        builder.build()
    }
}

fn default_true() -> bool {
    true
}

fn default_omittable_tags() -> Vec<String> {
    ExtractorConfig::default().known_omittable_tags
}
