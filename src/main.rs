mod cli;

use animencode::{
    config,
    job::{EncodeJob, JobEvent},
    pipeline::{self, BatchReport, FileOutcome, PipelineEvent, PipelineExecutor, PipelineSettings},
};
use animencode_av::{format_command, get_tool_path, EncodePreset};
use animencode_parser::NameExtractor;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Flags of the `encode` command that override the config file.
struct EncodeArgs {
    input: PathBuf,
    output_dir: Option<PathBuf>,
    preset: Option<PathBuf>,
    streams: Option<Vec<u32>>,
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    no_verify_source: bool,
    ffmpeg_verbose: bool,
    dry_run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "animencode=debug,animencode_av=debug".to_string()
        } else {
            "animencode=info,animencode_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Encode {
            input,
            output_dir,
            preset,
            streams,
            ffmpeg,
            ffprobe,
            no_verify_source,
            ffmpeg_verbose,
            dry_run,
        } => {
            let args = EncodeArgs {
                input,
                output_dir,
                preset,
                streams,
                ffmpeg,
                ffprobe,
                no_verify_source,
                ffmpeg_verbose,
                dry_run,
            };
            let code = encode(args, cli.config.as_deref())?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Parse { names, json } => parse_names(&names, json, cli.config.as_deref()),
        Commands::Probe { file, json } => probe_file(&file, json, cli.config.as_deref()),
        Commands::Preset { dir } => show_preset(&dir),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("animencode {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn encode(args: EncodeArgs, config_path: Option<&Path>) -> Result<i32> {
    let mut config = config::load_config_or_default(config_path)?;

    if args.ffmpeg.is_some() {
        config.tools.ffmpeg_path = args.ffmpeg;
    }
    if args.ffprobe.is_some() {
        config.tools.ffprobe_path = args.ffprobe;
    }
    if args.output_dir.is_some() {
        config.encode.output_dir = args.output_dir;
    }
    if args.preset.is_some() {
        config.encode.preset_dir = args.preset;
    }
    if args.no_verify_source {
        config.encode.verify_source = false;
    }
    if args.ffmpeg_verbose {
        config.encode.show_ffmpeg_output = true;
    }

    let mut settings = PipelineSettings::from_config(&config)?;
    settings.streams = args.streams.map(|indexes| indexes.into_iter().collect());
    settings.dry_run = args.dry_run;

    let inputs = pipeline::collect_inputs(&args.input)?;
    if inputs.is_empty() {
        println!("No video files found in {:?}", args.input);
        return Ok(0);
    }
    tracing::debug!(
        "Input list:\n\t{}",
        inputs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n\t")
    );

    let show_progress = !settings.show_ffmpeg_output;
    let executor = PipelineExecutor::new(settings);

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(run_job(executor, inputs, show_progress))?;

    print_report(&report);
    Ok(report.exit_code())
}

/// Drive the job to completion, cancelling it on Ctrl+C.
async fn run_job(
    executor: PipelineExecutor,
    inputs: Vec<PathBuf>,
    show_progress: bool,
) -> Result<BatchReport> {
    let mut job = EncodeJob::spawn(executor, inputs);
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());
    let mut listening = true;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if listening => {
                listening = false;
                if result.is_ok() {
                    job.cancel();
                }
            }
            event = job.next_event() => match event {
                Some(event) => print_event(&event, show_progress),
                None => break,
            }
        }
    }

    job.wait().await
}

fn print_event(event: &JobEvent, show_progress: bool) {
    let JobEvent::Pipeline(event) = event else {
        return;
    };
    let mut stderr = std::io::stderr();

    match event {
        PipelineEvent::FileStarted { index, total, path } => {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            let _ = writeln!(stderr, "[{}/{}] {}", index + 1, total, name);
        }
        PipelineEvent::Checksum { bytes, total, .. } if show_progress => {
            let percent = if *total > 0 {
                *bytes as f64 * 100.0 / *total as f64
            } else {
                100.0
            };
            let _ = write!(stderr, "\rCalculating CRC32: {:5.1}%", percent);
        }
        PipelineEvent::Encode(progress) if show_progress => {
            let _ = match (progress.total_frames, progress.fraction()) {
                (Some(total), Some(fraction)) => write!(
                    stderr,
                    "\rEncoding: frame {}/{} ({:5.1}%)",
                    progress.frame,
                    total,
                    fraction * 100.0
                ),
                _ => write!(stderr, "\rEncoding: frame {}", progress.frame),
            };
        }
        PipelineEvent::FileFinished(_) if show_progress => {
            let _ = writeln!(stderr);
        }
        _ => {}
    }
}

fn print_report(report: &BatchReport) {
    for outcome in &report.outcomes {
        match outcome {
            FileOutcome::Encoded { source, output } => {
                println!("✓ {} -> {}", source.display(), output.display());
            }
            FileOutcome::Planned { command, .. } => {
                println!("{}", format_command(command));
            }
            FileOutcome::Failed { source, error } => {
                println!("✗ {}: {}", source.display(), error);
            }
            FileOutcome::Aborted { source } => {
                println!("Encode canceled: {}", source.display());
            }
        }
    }
}

fn parse_names(names: &[String], json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let extractor = NameExtractor::new(config.parser.extractor_config());

    let mut results = Vec::with_capacity(names.len());
    for name in names {
        let metadata = extractor
            .extract(name)
            .with_context(|| format!("Failed to parse file name {:?}", name))?;
        results.push(metadata);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for metadata in &results {
            println!("{}\n", metadata);
        }
    }

    Ok(())
}

fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let ffprobe = get_tool_path("ffprobe", config.tools.ffprobe_path.as_deref())?;
    let catalog = animencode_av::probe(&ffprobe, file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        println!("File: {}", file.display());
        println!("{}", catalog);
    }

    Ok(())
}

fn show_preset(dir: &Path) -> Result<()> {
    let preset = EncodePreset::load(dir)?;
    println!("{}", preset);
    if !preset.has_stream_params() {
        println!("\nEncode preset not found, using ffmpeg default settings.");
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = animencode_av::check_tools(
        config.tools.ffmpeg_path.as_deref(),
        config.tools.ffprobe_path.as_deref(),
    );
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg and ffprobe to encode.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    let show = |path: &Option<PathBuf>| {
        path.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    println!("  ffmpeg: {}", show(&config.tools.ffmpeg_path));
    println!("  ffprobe: {}", show(&config.tools.ffprobe_path));
    println!("  Output directory: {}", show(&config.encode.output_dir));
    println!("  Preset directory: {}", show(&config.encode.preset_dir));
    println!("  Verify source: {}", config.encode.verify_source);
    println!(
        "  Omittable tags: {}",
        config.parser.known_omittable_tags.join(", ")
    );

    Ok(())
}
