//! Full pipeline tests against fake ffprobe/ffmpeg scripts.

#![cfg(unix)]

use animencode::pipeline::{FileOutcome, PipelineEvent, PipelineExecutor, PipelineSettings};
use animencode_av::EncodePreset;
use animencode_parser::ExtractorConfig;
use assert_matches::assert_matches;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const PROBE_JSON: &str = r#"{
  "streams": [
    {"index": 0, "codec_type": "video", "width": 1920, "height": 1080,
     "tags": {"NUMBER_OF_FRAMES-eng": "10"}},
    {"index": 1, "codec_type": "audio"},
    {"index": 2, "codec_type": "subtitle"}
  ],
  "chapters": [],
  "format": {"duration": "1.000000"}
}"#;

/// Writes args to `ffmpeg_args.txt`, prints progress and creates the output.
const FAKE_FFMPEG: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 6.1.1 Copyright (c) 2000-2023"
  exit 0
fi
printf '%s\n' "$@" > "$(dirname "$0")/ffmpeg_args.txt"
out=""
prev=""
for arg in "$@"; do
  if [ "$arg" = "-y" ]; then out="$prev"; fi
  prev="$arg"
done
echo "frame=    5 fps=0.0 q=0.0" >&2
echo "frame=   10 fps=0.0 q=0.0" >&2
printf 'encoded' > "$out"
"#;

const FAILING_FFMPEG: &str = r#"#!/bin/sh
echo "Unknown encoder 'libx999'" >&2
exit 1
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(ffmpeg_script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let tools = dir.path().join("tools");
        fs::create_dir(&tools).unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();

        write_script(
            &tools.join("ffprobe"),
            &format!("#!/bin/sh\ncat <<'EOF'\n{}\nEOF\n", PROBE_JSON),
        );
        write_script(&tools.join("ffmpeg"), ffmpeg_script);

        Self { dir }
    }

    fn tools(&self) -> PathBuf {
        self.dir.path().join("tools")
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn source(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join("src").join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn preset(&self, naming: &str) -> EncodePreset {
        let dir = self.dir.path().join("preset");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("naming.txt"), naming).unwrap();
        fs::write(
            dir.join("basic.json"),
            r#"{"video": {"crf": 24}, "audio": {"b": "96k"}, "container": ".mkv"}"#,
        )
        .unwrap();
        EncodePreset::load(&dir).unwrap()
    }

    fn settings(&self, preset: EncodePreset) -> PipelineSettings {
        PipelineSettings {
            ffmpeg: self.tools().join("ffmpeg"),
            ffprobe: self.tools().join("ffprobe"),
            output_dir: self.output_dir(),
            preset,
            streams: None,
            verify_source: true,
            show_ffmpeg_output: false,
            dry_run: false,
            extractor: ExtractorConfig::default(),
        }
    }

    fn ffmpeg_args(&self) -> Vec<String> {
        fs::read_to_string(self.tools().join("ffmpeg_args.txt"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn test_encode_and_rename() {
    let fx = Fixture::new(FAKE_FFMPEG);
    let source = fx.source("[Group] Show - 01 [1080p][CBF43926].mkv", b"123456789");
    let preset = fx.preset("[{release_group}] {episode_name} [{resolution_height}p][{crc32}]");

    let executor = PipelineExecutor::new(fx.settings(preset));
    let report = executor.run_batch(&[source.clone()]);

    assert_eq!(report.exit_code(), 0);
    let expected = fx.output_dir().join("[Group] Show - 01 [1080p][D6406181].mkv");
    assert_matches!(
        report.outcomes.as_slice(),
        [FileOutcome::Encoded { source: s, output }] if s == &source && output == &expected
    );
    assert!(expected.is_file());
    assert!(!fx
        .output_dir()
        .join("[Group] Show - 01 [1080p][CBF43926]_1.mkv")
        .exists());

    let args = fx.ffmpeg_args();
    let maps: Vec<&str> = args
        .windows(2)
        .filter(|w| w[0] == "-map")
        .map(|w| w[1].as_str())
        .collect();
    assert_eq!(maps, ["0:0", "0:1", "0:2"]);
    assert!(args.windows(2).any(|w| w[0] == "-crf:0" && w[1] == "24"));
    assert!(args.windows(2).any(|w| w[0] == "-b:1" && w[1] == "96k"));
    assert_eq!(args.last().map(String::as_str), Some("-y"));
}

#[test]
fn test_selected_streams_only() {
    let fx = Fixture::new(FAKE_FFMPEG);
    let source = fx.source("Title Only.mkv", b"x");
    let mut settings = fx.settings(fx.preset(""));
    settings.streams = Some([0, 1].into_iter().collect());

    let report = PipelineExecutor::new(settings).run_batch(&[source]);

    // Empty template keeps the working name.
    let expected = fx.output_dir().join("Title Only_1.mkv");
    assert_matches!(
        report.outcomes.as_slice(),
        [FileOutcome::Encoded { output, .. }] if output == &expected
    );
    let args = fx.ffmpeg_args();
    assert!(!args.iter().any(|a| a == "0:2"));
}

#[test]
fn test_dry_run_touches_nothing() {
    let fx = Fixture::new(FAKE_FFMPEG);
    let source = fx.source("[Group] Show - 02 (720p).mkv", b"x");
    let mut settings = fx.settings(fx.preset("{episode_name}"));
    settings.dry_run = true;

    let report = PipelineExecutor::new(settings).run_batch(&[source.clone()]);

    match report.outcomes.as_slice() {
        [FileOutcome::Planned { command, .. }] => {
            assert_eq!(command[1], "-i");
            assert_eq!(command[2], source.display().to_string());
        }
        other => panic!("unexpected outcomes: {other:?}"),
    }
    assert!(!fx.output_dir().exists());
    assert!(!fx.tools().join("ffmpeg_args.txt").exists());
}

#[test]
fn test_dry_run_skips_source_checksum() {
    let fx = Fixture::new(FAKE_FFMPEG);
    let source = fx.source("[Group] Show - 04 [CBF43926].mkv", &vec![b'x'; 300_000]);
    let mut settings = fx.settings(fx.preset("{episode_name} [{crc32}]"));
    settings.dry_run = true;
    assert!(settings.verify_source);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let executor = PipelineExecutor::new(settings)
        .with_event_callback(Box::new(move |event| sink.lock().unwrap().push(event)));
    let report = executor.run_batch(&[source]);

    assert_matches!(report.outcomes.as_slice(), [FileOutcome::Planned { .. }]);
    let events = events.lock().unwrap();
    assert!(!events
        .iter()
        .any(|e| matches!(e, PipelineEvent::Checksum { .. })));
}

#[test]
fn test_source_checksum_reported_when_encoding() {
    let fx = Fixture::new(FAKE_FFMPEG);
    let source = fx.source("[Group] Show - 05 [CBF43926].mkv", b"123456789");
    let settings = fx.settings(fx.preset("{episode_name}"));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let executor = PipelineExecutor::new(settings)
        .with_event_callback(Box::new(move |event| sink.lock().unwrap().push(event)));
    let report = executor.run_batch(&[source.clone()]);

    assert_eq!(report.exit_code(), 0);
    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::Checksum { path, total: 9, .. } if path == &source
    )));
}

#[test]
fn test_failed_encode_reports_tail() {
    let fx = Fixture::new(FAILING_FFMPEG);
    let first = fx.source("[A] One - 01.mkv", b"x");
    let second = fx.source("[A] One - 02.mkv", b"y");

    let executor = PipelineExecutor::new(fx.settings(fx.preset("")));
    let report = executor.run_batch(&[first, second]);

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.exit_code(), 1);
    assert_matches!(
        &report.outcomes[0],
        FileOutcome::Failed { error, .. } if error.contains("Unknown encoder")
    );
}

#[test]
fn test_rename_conflict_keeps_working_file() {
    let fx = Fixture::new(FAKE_FFMPEG);
    let source = fx.source("[Group] Show - 03.mkv", b"x");
    fs::create_dir_all(fx.output_dir()).unwrap();
    fs::write(fx.output_dir().join("Show - 03.mkv"), b"older").unwrap();

    let settings = fx.settings(fx.preset("{episode_name}"));
    let report = PipelineExecutor::new(settings).run_batch(&[source]);

    assert_matches!(
        &report.outcomes[0],
        FileOutcome::Failed { error, .. } if error.contains("destination exists")
    );
    assert!(fx.output_dir().join("[Group] Show - 03_1.mkv").is_file());
}
