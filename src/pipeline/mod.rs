//! Batch encode pipeline.
//!
//! Every source runs through extract, probe, verify, compile, encode,
//! re-probe and rename before the next one starts.

pub mod executor;

pub use executor::{EventCallback, PipelineExecutor};

use crate::config::Config;
use animencode_av::{get_tool_path, EncodeProgress, EncodePreset};
use animencode_parser::extractor::VIDEO_EXTENSIONS;
use animencode_parser::ExtractorConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Everything one pipeline run needs. Built per run from the config and CLI
/// flags; nothing is read from global state.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub output_dir: PathBuf,
    pub preset: EncodePreset,
    /// Stream indexes to keep; `None` keeps every stream.
    pub streams: Option<BTreeSet<u32>>,
    pub verify_source: bool,
    pub show_ffmpeg_output: bool,
    /// Compile commands without running them.
    pub dry_run: bool,
    pub extractor: ExtractorConfig,
}

impl PipelineSettings {
    /// Resolve tools, output directory and preset from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let ffmpeg = get_tool_path("ffmpeg", config.tools.ffmpeg_path.as_deref())?;
        let ffprobe = get_tool_path("ffprobe", config.tools.ffprobe_path.as_deref())?;

        let output_dir = config.encode.output_dir.clone().context(
            "must specify an output directory (encode -o DIR or encode.output_dir in config)",
        )?;

        let preset = match &config.encode.preset_dir {
            Some(dir) => EncodePreset::load(dir)
                .with_context(|| format!("Failed to load preset {:?}", dir))?,
            None => EncodePreset::default(),
        };

        Ok(Self {
            ffmpeg,
            ffprobe,
            output_dir,
            preset,
            streams: None,
            verify_source: config.encode.verify_source,
            show_ffmpeg_output: config.encode.show_ffmpeg_output,
            dry_run: false,
            extractor: config.parser.extractor_config(),
        })
    }
}

/// Progress and results reported while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    FileStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    /// Bytes hashed so far while checksumming `path`.
    Checksum { path: PathBuf, bytes: u64, total: u64 },
    Encode(EncodeProgress),
    FileFinished(FileOutcome),
}

/// Result of one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Encoded { source: PathBuf, output: PathBuf },
    /// Dry run: the command that would have been executed.
    Planned { source: PathBuf, command: Vec<String> },
    Failed { source: PathBuf, error: String },
    Aborted { source: PathBuf },
}

impl FileOutcome {
    pub fn source(&self) -> &Path {
        match self {
            FileOutcome::Encoded { source, .. }
            | FileOutcome::Planned { source, .. }
            | FileOutcome::Failed { source, .. }
            | FileOutcome::Aborted { source } => source,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, FileOutcome::Aborted { .. })
    }
}

/// Outcomes of a batch, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn aborted(&self) -> bool {
        self.outcomes.iter().any(FileOutcome::is_aborted)
    }

    /// Process exit code: 130 when cancelled, 1 when any file failed.
    pub fn exit_code(&self) -> i32 {
        if self.aborted() {
            130
        } else if self.failed().next().is_some() {
            1
        } else {
            0
        }
    }
}

/// Expand `input` into the files to encode.
///
/// A file is returned as is. A directory yields its video files (top level
/// only), sorted by name.
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        anyhow::bail!("Input does not exist: {:?}", input);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to read directory {:?}", input))?;
        if entry.file_type().is_file() && is_video_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// First free `{stem}_{n}{extension}` in `dir`, counting from 1.
pub fn unique_output_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    (1u32..)
        .map(|n| dir.join(format!("{}_{}{}", stem, n, extension)))
        .find(|path| !path.exists())
        .unwrap_or_else(|| dir.join(format!("{}{}", stem, extension)))
}
