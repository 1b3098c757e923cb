use super::{unique_output_path, BatchReport, FileOutcome, PipelineEvent, PipelineSettings};
use animencode_av::naming::CRC32;
use animencode_av::tools::tool_version;
use animencode_av::{
    compile, file_crc32, probe, rename_encoded_file, run_encode, EncodeOptions,
    EncodeOutcome, NamingContext, StreamSelection,
};
use animencode_parser::NameExtractor;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Event callback type
pub type EventCallback = Box<dyn Fn(PipelineEvent) + Send + Sync>;

/// Runs sources through the encode pipeline, one at a time.
pub struct PipelineExecutor {
    settings: PipelineSettings,
    extractor: NameExtractor,
    stop: Arc<AtomicBool>,
    event_callback: Option<EventCallback>,
}

impl PipelineExecutor {
    pub fn new(settings: PipelineSettings) -> Self {
        let extractor = NameExtractor::new(settings.extractor.clone());
        Self {
            settings,
            extractor,
            stop: Arc::new(AtomicBool::new(false)),
            event_callback: None,
        }
    }

    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    /// Flag that aborts the running checksum or encode when set.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref cb) = self.event_callback {
            cb(event);
        }
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Process `inputs` in order. A failed file is recorded and the batch
    /// continues; an abort ends the batch.
    pub fn run_batch(&self, inputs: &[PathBuf]) -> BatchReport {
        let settings = &self.settings;
        tracing::info!("Using presets: {}", settings.preset.name);
        if !settings.dry_run {
            match tool_version(&settings.ffmpeg) {
                Ok(version) => tracing::info!("Using ffmpeg {}", version),
                Err(e) => tracing::warn!("Could not read ffmpeg version: {}", e),
            }
        }

        let mut report = BatchReport::default();
        let total = inputs.len();

        for (index, source) in inputs.iter().enumerate() {
            if self.is_stopped() {
                report.outcomes.push(FileOutcome::Aborted {
                    source: source.clone(),
                });
                break;
            }

            tracing::info!("Processing {:?}", source.file_name().unwrap_or_default());
            self.emit(PipelineEvent::FileStarted {
                index,
                total,
                path: source.clone(),
            });

            let outcome = self.process_file(source).unwrap_or_else(|e| {
                tracing::warn!("Encode failed for file {:?}: {:#}", source, e);
                FileOutcome::Failed {
                    source: source.clone(),
                    error: format!("{:#}", e),
                }
            });

            self.emit(PipelineEvent::FileFinished(outcome.clone()));
            let aborted = outcome.is_aborted();
            report.outcomes.push(outcome);
            if aborted {
                tracing::info!("Encode canceled");
                break;
            }
        }

        tracing::info!("Process completed.");
        let failed: Vec<String> = report
            .failed()
            .map(|o| o.source().display().to_string())
            .collect();
        if !failed.is_empty() {
            tracing::info!(
                "The following file(s) did not encode:\n\t{}",
                failed.join("\n\t")
            );
        }

        report
    }

    /// Run one source through the pipeline.
    pub fn process_file(&self, source: &Path) -> Result<FileOutcome> {
        let settings = &self.settings;

        if !source.is_file() {
            anyhow::bail!("Input file does not exist: {:?}", source);
        }

        let metadata = self
            .extractor
            .extract_path(source)
            .with_context(|| format!("Failed to parse file name {:?}", source))?;
        tracing::debug!("Source metadata:\n{}", metadata);

        let catalog = probe(&settings.ffprobe, source)
            .with_context(|| format!("Failed to probe {:?}", source))?;
        tracing::debug!("Source streams:\n{}", catalog);

        // Dry runs never read the source.
        if settings.verify_source && !settings.dry_run {
            if let Some(expected) = &metadata.crc32_from_name {
                match self.checksum(source)? {
                    None => return Ok(aborted(source)),
                    Some(actual) if actual.eq_ignore_ascii_case(expected) => {
                        tracing::info!("CRC32 verified: {}", actual);
                    }
                    Some(actual) => {
                        tracing::warn!(
                            "CRC32 mismatch for {:?}: name says {}, file is {}",
                            source,
                            expected,
                            actual
                        );
                    }
                }
            }
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output = unique_output_path(
            &settings.output_dir,
            &stem,
            &settings.preset.container_extension,
        );

        let selection = match &settings.streams {
            Some(indexes) => StreamSelection::from_indexes(&catalog, indexes),
            None => StreamSelection::all(),
        };
        let args = compile(
            &catalog,
            &selection,
            &settings.preset,
            source,
            &output,
            &settings.ffmpeg,
        );

        if settings.dry_run {
            return Ok(FileOutcome::Planned {
                source: source.to_path_buf(),
                command: args,
            });
        }

        std::fs::create_dir_all(&settings.output_dir).with_context(|| {
            format!("Failed to create output directory {:?}", settings.output_dir)
        })?;

        let options = EncodeOptions {
            show_output: settings.show_ffmpeg_output,
            ..EncodeOptions::default()
        };
        let outcome = run_encode(
            &args,
            &output,
            catalog.frame_count,
            &options,
            |progress| self.emit(PipelineEvent::Encode(progress)),
            || self.is_stopped(),
        )?;
        if outcome == EncodeOutcome::Aborted {
            return Ok(aborted(source));
        }

        let encoded = probe(&settings.ffprobe, &output)
            .with_context(|| format!("Failed to probe encoded file {:?}", output))?;

        let naming = &settings.preset.naming;
        let ctx = NamingContext::build(naming, &metadata, &encoded, &settings.preset, || {
            self.checksum(&output)
        })?;
        if ctx.contains(CRC32) && ctx.get(CRC32).is_none() {
            // Checksum abandoned; keep the working name.
            return Ok(aborted(source));
        }

        let renamed = rename_encoded_file(naming, &output, &ctx, true)?;
        tracing::info!(
            "Encode complete >> {}",
            renamed.file_name().unwrap_or_default().to_string_lossy()
        );

        Ok(FileOutcome::Encoded {
            source: source.to_path_buf(),
            output: renamed,
        })
    }

    /// CRC32 of `path`, reporting progress. `None` when stopped.
    fn checksum(&self, path: &Path) -> animencode_av::Result<Option<String>> {
        let total = std::fs::metadata(path)?.len();
        file_crc32(
            path,
            |bytes| {
                self.emit(PipelineEvent::Checksum {
                    path: path.to_path_buf(),
                    bytes,
                    total,
                })
            },
            || self.is_stopped(),
        )
    }
}

fn aborted(source: &Path) -> FileOutcome {
    FileOutcome::Aborted {
        source: source.to_path_buf(),
    }
}
