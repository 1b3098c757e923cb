//! # animencode-av
//!
//! ffprobe/ffmpeg plumbing for batch anime encodes.
//!
//! This crate provides:
//!
//! - **Probing** ([`probe()`]) -- turn ffprobe's JSON report into a
//!   [`StreamCatalog`] of stream indexes per kind, duration, frame count,
//!   resolution and chapters.
//! - **Presets** ([`EncodePreset`]) -- load a preset directory
//!   (`basic.json`, `extra_param.txt`, `naming.txt`, `tag_divider.txt`).
//! - **Command compilation** ([`compile`]) -- build the ffmpeg argument list
//!   for a catalog, a [`StreamSelection`] and a preset.
//! - **Encoding** ([`run_encode`]) -- run ffmpeg with progress callbacks and
//!   cooperative abort.
//! - **Naming** ([`NamingContext`], [`rename_encoded_file`]) -- render the
//!   preset's naming template and rename the encoded file.
//! - **Checksums** ([`file_crc32`]) -- CRC32 of a file for `{crc32}` and for
//!   verifying sources against the CRC in their name.
//!
//! ## Features
//!
//! - `tracing` - Log through the `tracing` crate
//!
//! ## Example
//!
//! ```no_run
//! use animencode_av::{compile, probe, EncodePreset, StreamSelection};
//! use std::path::Path;
//!
//! let source = Path::new("/anime/[Group] Show - 01 [1080p].mkv");
//! let catalog = probe(Path::new("ffprobe"), source)?;
//! let preset = EncodePreset::load(Path::new("/presets/hevc"))?;
//!
//! let args = compile(
//!     &catalog,
//!     &StreamSelection::all(),
//!     &preset,
//!     source,
//!     Path::new("/out/Show - 01.mkv"),
//!     Path::new("ffmpeg"),
//! );
//! println!("{}", animencode_av::format_command(&args));
//! # Ok::<(), animencode_av::Error>(())
//! ```

pub mod checksum;
pub mod command;
pub mod encode;
mod error;
pub mod naming;
pub mod preset;
pub mod probe;
pub mod tools;

// Re-exports
pub use checksum::{crc32_of, file_crc32, verify_crc32};
pub use command::{compile, compile_quiet, format_command, Selection, StreamSelection};
pub use encode::{run_encode, EncodeOptions, EncodeOutcome, EncodeProgress};
pub use error::{Error, Result};
pub use naming::{rename_encoded_file, NamingContext};
pub use preset::{EncodePreset, OptionGroup, StreamParams, DEFAULT_CONTAINER};
pub use probe::{probe, Chapter, Resolution, StreamCatalog, StreamKind};
pub use tools::{check_tools, ff_version, get_tool_path, require_tool, ToolInfo};
