//! ffmpeg argument compilation.
//!
//! Turns a [`StreamCatalog`], a [`StreamSelection`] and an [`EncodePreset`]
//! into the exact argument vector passed to the transcoder:
//!
//! ```text
//! ffmpeg <input opts> -i <source>
//!        -map 0:<v> -<opt>:<n> <val> ...   (video, then audio, then subtitle)
//!        <attachment mapping> [-map_chapters -1] <other opts> <extra> <output> -y
//! ```
//!
//! `<n>` is the output stream number. It counts every mapped stream, whatever
//! its kind.

use crate::preset::{EncodePreset, OptionGroup};
use crate::probe::{StreamCatalog, StreamKind};
use std::collections::BTreeSet;
use std::path::Path;

/// Which streams of one kind to map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every stream of this kind in the catalog.
    #[default]
    All,
    /// Exactly these indexes; an empty set maps nothing.
    Only(BTreeSet<u32>),
}

impl Selection {
    /// Explicitly select nothing.
    pub fn none() -> Self {
        Selection::Only(BTreeSet::new())
    }

    /// Indexes to map, given the catalog's streams of this kind.
    pub fn resolve<'a>(&'a self, available: &'a BTreeSet<u32>) -> &'a BTreeSet<u32> {
        match self {
            Selection::All => available,
            Selection::Only(indexes) => indexes,
        }
    }
}

/// Per-kind stream selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSelection {
    pub video: Selection,
    pub audio: Selection,
    pub subtitle: Selection,
    pub attachment: Selection,
}

impl StreamSelection {
    /// Map every stream the catalog knows about.
    pub fn all() -> Self {
        Self::default()
    }

    /// Select exactly `indexes`, split by the kind the catalog recorded for
    /// each. Indexes the catalog does not know are dropped.
    pub fn from_indexes(catalog: &StreamCatalog, indexes: &BTreeSet<u32>) -> Self {
        let pick = |kind: StreamKind| {
            Selection::Only(
                catalog
                    .streams(kind)
                    .intersection(indexes)
                    .copied()
                    .collect(),
            )
        };
        Self {
            video: pick(StreamKind::Video),
            audio: pick(StreamKind::Audio),
            subtitle: pick(StreamKind::Subtitle),
            attachment: pick(StreamKind::Attachment),
        }
    }

    pub fn get(&self, kind: StreamKind) -> &Selection {
        match kind {
            StreamKind::Video => &self.video,
            StreamKind::Audio => &self.audio,
            StreamKind::Subtitle => &self.subtitle,
            StreamKind::Attachment => &self.attachment,
        }
    }
}

/// Compile the transcoder argument vector, starting with `executable`.
///
/// Logs a warning when the preset carries no stream options.
///
/// ```
/// use animencode_av::command::{compile, StreamSelection};
/// use animencode_av::{EncodePreset, StreamCatalog};
/// use std::path::Path;
///
/// let args = compile(
///     &StreamCatalog::default(),
///     &StreamSelection::all(),
///     &EncodePreset::default(),
///     Path::new("in.mkv"),
///     Path::new("out.mkv"),
///     Path::new("ffmpeg"),
/// );
/// assert_eq!(args, ["ffmpeg", "-i", "in.mkv", "out.mkv", "-y"]);
/// ```
pub fn compile(
    catalog: &StreamCatalog,
    selection: &StreamSelection,
    preset: &EncodePreset,
    source: &Path,
    output: &Path,
    executable: &Path,
) -> Vec<String> {
    if !preset.has_stream_params() {
        #[cfg(feature = "tracing")]
        tracing::warn!("Encode preset not found, using ffmpeg default settings.");
    }
    compile_quiet(catalog, selection, preset, source, output, executable)
}

/// [`compile`] without the default-preset warning.
pub fn compile_quiet(
    catalog: &StreamCatalog,
    selection: &StreamSelection,
    preset: &EncodePreset,
    source: &Path,
    output: &Path,
    executable: &Path,
) -> Vec<String> {
    let params = &preset.stream_params;
    let mut args = vec![executable.display().to_string()];

    push_global(&mut args, &params.input);
    args.push("-i".to_string());
    args.push(source.display().to_string());

    let mut counter = 0usize;
    let mapped = [
        (StreamKind::Video, &params.video),
        (StreamKind::Audio, &params.audio),
        (StreamKind::Subtitle, &params.subtitle),
    ];
    for (kind, options) in mapped {
        for index in selection.get(kind).resolve(catalog.streams(kind)) {
            args.push("-map".to_string());
            args.push(format!("0:{}", index));
            for (key, value) in options.values() {
                args.push(format!("-{}:{}", key, counter));
                args.push(value.to_string());
            }
            counter += 1;
        }
    }

    push_attachments(&mut args, catalog, &selection.attachment, params.keep_attachments);

    if !params.keep_chapters {
        args.extend(["-map_chapters".to_string(), "-1".to_string()]);
    }

    push_global(&mut args, &params.other);
    args.extend(preset.extra_options.iter().cloned());
    args.push(output.display().to_string());
    args.push("-y".to_string());

    #[cfg(feature = "tracing")]
    tracing::debug!("Encode param: {}", format_command(&args));

    args
}

fn push_global(args: &mut Vec<String>, options: &OptionGroup) {
    for (key, value) in options.values() {
        args.push(format!("-{}", key));
        args.push(value.to_string());
    }
}

fn push_attachments(
    args: &mut Vec<String>,
    catalog: &StreamCatalog,
    selection: &Selection,
    keep: bool,
) {
    let available = &catalog.attachment;
    if available.is_empty() {
        return;
    }

    let copy_all = match selection {
        Selection::All => keep,
        Selection::Only(indexes) if indexes.is_empty() => return,
        Selection::Only(indexes) => keep && indexes.is_superset(available),
    };

    if copy_all {
        args.extend(["-map", "0:t", "-c:t", "copy"].map(String::from));
    } else if let Selection::Only(indexes) = selection {
        for index in indexes {
            args.push("-map".to_string());
            args.push(format!("0:{}", index));
        }
        args.extend(["-c:t", "copy"].map(String::from));
    }
}

/// Render arguments for display, quoting those that contain spaces.
pub fn format_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.contains(' ') {
                format!("\"{}\"", arg)
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::StreamParams;

    fn catalog(video: &[u32], audio: &[u32], subtitle: &[u32], attachment: &[u32]) -> StreamCatalog {
        StreamCatalog {
            video: video.iter().copied().collect(),
            audio: audio.iter().copied().collect(),
            subtitle: subtitle.iter().copied().collect(),
            attachment: attachment.iter().copied().collect(),
            ..StreamCatalog::default()
        }
    }

    fn preset(params: StreamParams) -> EncodePreset {
        EncodePreset {
            stream_params: params,
            ..EncodePreset::default()
        }
    }

    fn run(catalog: &StreamCatalog, selection: &StreamSelection, preset: &EncodePreset) -> Vec<String> {
        compile_quiet(
            catalog,
            selection,
            preset,
            Path::new("/src/in.mkv"),
            Path::new("/out/out.mkv"),
            Path::new("ffmpeg"),
        )
    }

    #[test]
    fn test_empty_preset_empty_catalog() {
        let args = run(&StreamCatalog::default(), &StreamSelection::all(), &EncodePreset::default());
        assert_eq!(args, ["ffmpeg", "-i", "/src/in.mkv", "/out/out.mkv", "-y"]);
    }

    #[test]
    fn test_per_stream_options_use_global_counter() {
        let preset = preset(StreamParams {
            video: OptionGroup::new().with("crf", "24"),
            audio: OptionGroup::new().with("b", "96k"),
            ..StreamParams::default()
        });
        let args = run(&catalog(&[0], &[1, 2], &[], &[]), &StreamSelection::all(), &preset);
        assert_eq!(
            args[3..args.len() - 2].join(" "),
            "-map 0:0 -crf:0 24 -map 0:1 -b:1 96k -map 0:2 -b:2 96k"
        );
    }

    #[test]
    fn test_input_options_precede_input() {
        let preset = preset(StreamParams {
            input: OptionGroup::new().with("hwaccel", "cuda"),
            ..StreamParams::default()
        });
        let args = run(&StreamCatalog::default(), &StreamSelection::all(), &preset);
        assert_eq!(
            args,
            ["ffmpeg", "-hwaccel", "cuda", "-i", "/src/in.mkv", "/out/out.mkv", "-y"]
        );
    }

    #[test]
    fn test_null_options_skipped() {
        let mut video = OptionGroup::new().with("c", "libx265");
        video.set("x265-params", None);
        let preset = preset(StreamParams {
            video,
            ..StreamParams::default()
        });
        let args = run(&catalog(&[0], &[], &[], &[]), &StreamSelection::all(), &preset);
        assert_eq!(args.join(" "), "ffmpeg -i /src/in.mkv -map 0:0 -c:0 libx265 /out/out.mkv -y");
    }

    #[test]
    fn test_subtitles_after_audio() {
        let preset = preset(StreamParams {
            subtitle: OptionGroup::new().with("c", "copy"),
            ..StreamParams::default()
        });
        let args = run(&catalog(&[0], &[1], &[2, 3], &[]), &StreamSelection::all(), &preset);
        assert_eq!(
            args.join(" "),
            "ffmpeg -i /src/in.mkv -map 0:0 -map 0:1 -map 0:2 -c:2 copy -map 0:3 -c:3 copy /out/out.mkv -y"
        );
    }

    #[test]
    fn test_attachments_all() {
        let args = run(&catalog(&[0], &[], &[], &[4, 5]), &StreamSelection::all(), &EncodePreset::default());
        assert_eq!(
            args.join(" "),
            "ffmpeg -i /src/in.mkv -map 0:0 -map 0:t -c:t copy /out/out.mkv -y"
        );
    }

    #[test]
    fn test_attachments_dropped_when_not_kept() {
        let preset = preset(StreamParams {
            keep_attachments: false,
            ..StreamParams::default()
        });
        let args = run(&catalog(&[], &[], &[], &[4]), &StreamSelection::all(), &preset);
        assert!(!args.iter().any(|a| a == "-c:t"));
    }

    #[test]
    fn test_attachments_explicit_subset() {
        let selection = StreamSelection {
            attachment: Selection::Only(BTreeSet::from([5])),
            ..StreamSelection::all()
        };
        let args = run(&catalog(&[], &[], &[], &[4, 5]), &selection, &EncodePreset::default());
        assert_eq!(args.join(" "), "ffmpeg -i /src/in.mkv -map 0:5 -c:t copy /out/out.mkv -y");
    }

    #[test]
    fn test_attachments_explicit_none() {
        let selection = StreamSelection {
            attachment: Selection::none(),
            ..StreamSelection::all()
        };
        let args = run(&catalog(&[], &[], &[], &[4, 5]), &selection, &EncodePreset::default());
        assert_eq!(args, ["ffmpeg", "-i", "/src/in.mkv", "/out/out.mkv", "-y"]);
    }

    #[test]
    fn test_attachments_explicit_full_set() {
        let selection = StreamSelection {
            attachment: Selection::Only(BTreeSet::from([4, 5])),
            ..StreamSelection::all()
        };
        let args = run(&catalog(&[], &[], &[], &[4, 5]), &selection, &EncodePreset::default());
        assert_eq!(args.join(" "), "ffmpeg -i /src/in.mkv -map 0:t -c:t copy /out/out.mkv -y");
    }

    #[test]
    fn test_chapters_extra_and_other_options() {
        let mut preset = preset(StreamParams {
            keep_chapters: false,
            other: OptionGroup::new().with("max_muxing_queue_size", "1024"),
            ..StreamParams::default()
        });
        preset.extra_options = vec!["-metadata".to_string(), "title=My Encode".to_string()];

        let args = run(&StreamCatalog::default(), &StreamSelection::all(), &preset);
        assert_eq!(
            args,
            [
                "ffmpeg",
                "-i",
                "/src/in.mkv",
                "-map_chapters",
                "-1",
                "-max_muxing_queue_size",
                "1024",
                "-metadata",
                "title=My Encode",
                "/out/out.mkv",
                "-y"
            ]
        );
        assert!(format_command(&args).contains("\"title=My Encode\""));
    }

    #[test]
    fn test_selection_from_indexes() {
        let catalog = catalog(&[0], &[1, 2], &[3], &[4]);
        let selection = StreamSelection::from_indexes(&catalog, &BTreeSet::from([0, 2, 9]));
        assert_eq!(selection.video, Selection::Only(BTreeSet::from([0])));
        assert_eq!(selection.audio, Selection::Only(BTreeSet::from([2])));
        assert_eq!(selection.subtitle, Selection::none());
        assert_eq!(selection.attachment, Selection::none());

        let args = run(&catalog, &selection, &EncodePreset::default());
        assert_eq!(args.join(" "), "ffmpeg -i /src/in.mkv -map 0:0 -map 0:2 /out/out.mkv -y");
    }

    #[test]
    fn test_compile_is_deterministic() {
        let preset = preset(StreamParams {
            video: OptionGroup::new().with("crf", "24").with("preset", "slow"),
            ..StreamParams::default()
        });
        let catalog = catalog(&[0], &[1], &[2], &[3]);
        assert_eq!(
            run(&catalog, &StreamSelection::all(), &preset),
            run(&catalog, &StreamSelection::all(), &preset)
        );
    }
}
