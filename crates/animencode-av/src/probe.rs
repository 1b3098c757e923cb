//! Stream catalog built from ffprobe output.

use crate::error::check_source;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::process::Command;

/// Container stream kinds the encoder knows how to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Attachment,
}

impl StreamKind {
    /// All kinds, in command mapping order.
    pub const ALL: [StreamKind; 4] = [
        StreamKind::Video,
        StreamKind::Audio,
        StreamKind::Subtitle,
        StreamKind::Attachment,
    ];

    /// Map an ffprobe `codec_type` value. Data and unknown kinds return `None`.
    pub fn from_codec_type(codec_type: &str) -> Option<Self> {
        match codec_type {
            "video" => Some(StreamKind::Video),
            "audio" => Some(StreamKind::Audio),
            "subtitle" => Some(StreamKind::Subtitle),
            "attachment" => Some(StreamKind::Attachment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
            StreamKind::Subtitle => "subtitle",
            StreamKind::Attachment => "attachment",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chapter marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chapter {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub title: Option<String>,
}

/// Video dimensions of the first video stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Stream indexes grouped by kind plus the facts the encoder needs about the
/// source: duration, frame count, resolution and chapters.
///
/// The four index sets are disjoint. A catalog describes one probe call;
/// probing the encoded output produces a new catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamCatalog {
    pub video: BTreeSet<u32>,
    pub audio: BTreeSet<u32>,
    pub subtitle: BTreeSet<u32>,
    pub attachment: BTreeSet<u32>,
    pub duration_seconds: Option<f64>,
    pub frame_count: Option<u64>,
    pub resolution: Resolution,
    pub chapters: Vec<Chapter>,
}

impl StreamCatalog {
    /// Indexes of one kind.
    pub fn streams(&self, kind: StreamKind) -> &BTreeSet<u32> {
        match kind {
            StreamKind::Video => &self.video,
            StreamKind::Audio => &self.audio,
            StreamKind::Subtitle => &self.subtitle,
            StreamKind::Attachment => &self.attachment,
        }
    }

    fn streams_mut(&mut self, kind: StreamKind) -> &mut BTreeSet<u32> {
        match kind {
            StreamKind::Video => &mut self.video,
            StreamKind::Audio => &mut self.audio,
            StreamKind::Subtitle => &mut self.subtitle,
            StreamKind::Attachment => &mut self.attachment,
        }
    }

    /// Record a stream. An index already recorded under any kind is ignored.
    pub fn insert(&mut self, kind: StreamKind, index: u32) -> bool {
        if self.kind_of(index).is_some() {
            return false;
        }
        self.streams_mut(kind).insert(index)
    }

    /// Which kind an index was recorded under.
    pub fn kind_of(&self, index: u32) -> Option<StreamKind> {
        StreamKind::ALL
            .into_iter()
            .find(|kind| self.streams(*kind).contains(&index))
    }

    /// Every recorded index regardless of kind.
    pub fn all_indexes(&self) -> BTreeSet<u32> {
        StreamKind::ALL
            .into_iter()
            .flat_map(|kind| self.streams(kind).iter().copied())
            .collect()
    }

    /// Whether no stream of a known kind was recorded.
    pub fn is_empty(&self) -> bool {
        StreamKind::ALL
            .into_iter()
            .all(|kind| self.streams(kind).is_empty())
    }

    /// Build a catalog from an ffprobe JSON report for `path`.
    ///
    /// `path` must be an existing file. The report must contain a `streams`
    /// array; `format` and `chapters` are optional.
    ///
    /// ```
    /// use animencode_av::StreamCatalog;
    ///
    /// let dir = tempfile::tempdir()?;
    /// let file = dir.path().join("ep.mkv");
    /// std::fs::write(&file, b"")?;
    ///
    /// let json = r#"{"streams": [
    ///     {"index": 0, "codec_type": "video", "width": 1920, "height": 1080},
    ///     {"index": 1, "codec_type": "audio"}
    /// ]}"#;
    /// let catalog = StreamCatalog::from_probe_output(&file, json)?;
    /// assert_eq!(catalog.resolution.height, Some(1080));
    /// assert!(catalog.audio.contains(&1));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_probe_output(path: &Path, json: &str) -> Result<Self> {
        check_source(path)?;
        let report: ProbeReport =
            serde_json::from_str(json).map_err(|e| Error::probe_parse(path, e.to_string()))?;
        Ok(Self::from_report(report))
    }

    fn from_report(report: ProbeReport) -> Self {
        let mut catalog = StreamCatalog::default();
        let mut first_video: Option<(u32, ProbeStream)> = None;

        for (position, stream) in report.streams.into_iter().enumerate() {
            let Some(index) = stream.index.or_else(|| u32::try_from(position).ok()) else {
                continue;
            };
            let Some(kind) = stream.codec_type.as_deref().and_then(StreamKind::from_codec_type)
            else {
                continue;
            };
            if !catalog.insert(kind, index) {
                continue;
            }
            if kind == StreamKind::Video
                && first_video.as_ref().map_or(true, |(best, _)| index < *best)
            {
                first_video = Some((index, stream));
            }
        }

        catalog.duration_seconds = report
            .format
            .as_ref()
            .and_then(|format| format.duration.as_ref())
            .and_then(as_f64);

        if let Some((_, video)) = first_video {
            catalog.resolution = Resolution {
                width: video.width,
                height: video.height,
            };
            if catalog.duration_seconds.is_none() {
                catalog.duration_seconds = tag_matching(&video.tags, "DURATION")
                    .and_then(parse_timestamp)
                    .or_else(|| video.duration.as_ref().and_then(as_f64));
            }
            catalog.frame_count = tag_matching(&video.tags, "NUMBER_OF_FRAMES")
                .and_then(|v| v.trim().parse().ok())
                .or_else(|| video.nb_frames.as_ref().and_then(as_u64));
        }

        catalog.chapters = report
            .chapters
            .into_iter()
            .filter_map(|chapter| {
                Some(Chapter {
                    start: as_f64(chapter.start_time.as_ref()?)?,
                    end: as_f64(chapter.end_time.as_ref()?)?,
                    title: chapter.tags.get("title").cloned(),
                })
            })
            .collect();

        catalog
    }
}

impl fmt::Display for StreamCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in StreamKind::ALL {
            let indexes: Vec<String> = self.streams(kind).iter().map(|i| i.to_string()).collect();
            writeln!(f, "{:<11} {}", format!("{}:", kind), indexes.join(", "))?;
        }
        match (self.resolution.width, self.resolution.height) {
            (Some(w), Some(h)) => writeln!(f, "resolution: {}x{}", w, h)?,
            _ => writeln!(f, "resolution: -")?,
        }
        match self.duration_seconds {
            Some(d) => writeln!(f, "duration:   {:.3}s", d)?,
            None => writeln!(f, "duration:   -")?,
        }
        match self.frame_count {
            Some(n) => writeln!(f, "frames:     {}", n)?,
            None => writeln!(f, "frames:     -")?,
        }
        write!(f, "chapters:   {}", self.chapters.len())
    }
}

/// Probe `path` with ffprobe and build its catalog.
pub fn probe(ffprobe: &Path, path: &Path) -> Result<StreamCatalog> {
    check_source(path)?;

    #[cfg(feature = "tracing")]
    tracing::debug!("Probing {:?} with {:?}", path, ffprobe);

    let output = Command::new(ffprobe)
        .arg(path)
        .args([
            "-v",
            "error",
            "-show_format",
            "-show_streams",
            "-show_chapters",
            "-print_format",
            "json",
        ])
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(ffprobe.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("no output");
        return Err(Error::tool_failed(
            "ffprobe",
            format!("{}: {}", path.display(), last.trim()),
        ));
    }

    let json = String::from_utf8_lossy(&output.stdout);
    StreamCatalog::from_probe_output(path, &json)
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: Option<ProbeFormat>,
    streams: Vec<ProbeStream>,
    #[serde(default)]
    chapters: Vec<ProbeChapter>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    duration: Option<serde_json::Value>,
    #[serde(default)]
    nb_frames: Option<serde_json::Value>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProbeChapter {
    #[serde(default)]
    start_time: Option<serde_json::Value>,
    #[serde(default)]
    end_time: Option<serde_json::Value>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// ffprobe prints numbers as strings; accept both.
fn as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Value of the tag named exactly `key`, else of the lexicographically
/// smallest tag whose name contains it (e.g. `NUMBER_OF_FRAMES-eng`).
fn tag_matching<'a>(tags: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    tags.get(key)
        .or_else(|| {
            tags.iter()
                .find(|(name, _)| name.contains(key))
                .map(|(_, value)| value)
        })
        .map(String::as_str)
}

/// Parse `H:MM:SS.fffffffff` into seconds.
fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
