//! External tool detection and management.

use crate::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

static FF_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ff.+? version (\S+) ").expect("valid regex"));

/// Information about an external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Extract the version from an ffmpeg/ffprobe banner.
///
/// ```
/// use animencode_av::tools::ff_version;
///
/// let banner = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023";
/// assert_eq!(ff_version(banner).as_deref(), Some("6.1.1-3ubuntu5"));
/// assert_eq!(ff_version("mkvmerge v82.0"), None);
/// ```
pub fn ff_version(banner: &str) -> Option<String> {
    FF_VERSION_RE
        .captures(banner)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Run `<path> -version` and check the result.
///
/// The reported version is the parsed ff version when the banner has one,
/// otherwise the first output line.
pub fn check_tool_at(name: &str, path: &Path) -> ToolInfo {
    let result = Command::new(path).arg("-version").output();

    match result {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = ff_version(&stdout)
                .or_else(|| stdout.lines().next().map(|s| s.trim().to_string()));

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path: which::which(path).ok().or_else(|| Some(path.to_path_buf())),
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check ffmpeg and ffprobe, honouring configured paths.
pub fn check_tools(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Vec<ToolInfo> {
    [("ffmpeg", ffmpeg), ("ffprobe", ffprobe)]
        .into_iter()
        .map(|(name, configured)| check_tool_at(name, configured.unwrap_or(Path::new(name))))
        .collect()
}

/// Require that a tool is available on `PATH`, returning its path.
///
/// # Errors
///
/// Returns an error if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
///
/// A configured value may be a path or a bare executable name. A configured
/// value that resolves to nothing is an error rather than a silent fallback.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => {
            which::which(path).map_err(|_| Error::tool_not_found(path.display().to_string()))
        }
        None => require_tool(name),
    }
}

/// Version reported by an ff tool at `path`.
///
/// # Errors
///
/// Returns an error if the tool cannot be run or its banner has no version.
pub fn tool_version(path: &Path) -> Result<String> {
    let output = Command::new(path).arg("-version").output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::tool_not_found(path.display().to_string())
        } else {
            Error::Io(e)
        }
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    ff_version(&stdout).ok_or_else(|| {
        Error::tool_failed(path.display().to_string(), "could not read version banner")
    })
}
