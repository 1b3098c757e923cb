//! Error types for animencode-av.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while probing, encoding or renaming.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool failed to execute.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// The prober report could not be understood.
    #[error("failed to parse probe report for {}: {message}", path.display())]
    ProbeParse { path: PathBuf, message: String },

    /// The specified file was not found.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The path exists but is not a regular file.
    #[error("not a file: {}", path.display())]
    NotAFile { path: PathBuf },

    /// The transcoder exited unsuccessfully.
    #[error("encode failed for {} ({}): {}", path.display(), describe_exit(*code), tail.join(" | "))]
    EncodeFailed {
        path: PathBuf,
        code: Option<i32>,
        /// Last lines of transcoder output.
        tail: Vec<String>,
    },

    /// The rename target already exists.
    #[error("cannot rename {} to {}: destination exists", from.display(), to.display())]
    RenameConflict { from: PathBuf, to: PathBuf },

    /// The preset directory does not exist.
    #[error("preset directory not found: {}", path.display())]
    PresetNotFound { path: PathBuf },

    /// A preset file is malformed.
    #[error("invalid preset file {}: {message}", path.display())]
    InvalidPreset { path: PathBuf, message: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a probe parse error.
    pub fn probe_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ProbeParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Whether this error is about the input file itself rather than a tool
    /// or the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::FileNotFound { .. } | Self::NotAFile { .. })
    }
}

/// Fail unless `path` names an existing regular file.
pub(crate) fn check_source(path: &std::path::Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }
    if !path.is_file() {
        return Err(Error::NotAFile {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
