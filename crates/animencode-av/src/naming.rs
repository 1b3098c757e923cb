//! Output naming templates.
//!
//! A naming template is plain text with `{placeholder}` markers:
//!
//! ```text
//! [{release_group}] {episode_name} [{resolution_height}p][{tags}][{crc32}]
//! ```
//!
//! Placeholders are replaced literally in one left-to-right pass, so a value
//! that happens to contain `{...}` is never expanded again. Unknown
//! placeholders are left as written.

use crate::preset::EncodePreset;
use crate::probe::StreamCatalog;
use crate::{Error, Result};
use animencode_parser::SourceMetadata;
use std::path::{Path, PathBuf};

pub const RELEASE_GROUP: &str = "release_group";
pub const EPISODE_NAME: &str = "episode_name";
pub const RESOLUTION_WIDTH: &str = "resolution_width";
pub const RESOLUTION_HEIGHT: &str = "resolution_height";
pub const TAGS: &str = "tags";
pub const CRC32: &str = "crc32";

/// Placeholder values for one rename.
///
/// A variable set to `None` renders as an empty string.
///
/// # Example
///
/// ```
/// use animencode_av::NamingContext;
///
/// let ctx = NamingContext::new()
///     .with_var("release_group", Some("Me"))
///     .with_var("episode_name", Some("Slow Loop - 07"))
///     .with_var("crc32", None);
///
/// assert_eq!(
///     ctx.render("[{release_group}] {episode_name} [{crc32}]").as_deref(),
///     Some("[Me] Slow Loop - 07 []")
/// );
/// assert_eq!(ctx.render(""), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingContext {
    vars: Vec<(String, Option<String>)>,
}

impl NamingContext {
    /// Create a new empty naming context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the standard placeholders for an encoded file.
    ///
    /// `{release_group}`, `{episode_name}` and `{tags}` come from the source
    /// filename; `{resolution_width}` and `{resolution_height}` from the
    /// encoded file's catalog. `crc32` is only called when `template`
    /// contains `{crc32}`; it returns `Ok(None)` when the checksum was
    /// abandoned.
    pub fn build<F>(
        template: &str,
        source: &SourceMetadata,
        encoded: &StreamCatalog,
        preset: &EncodePreset,
        crc32: F,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<Option<String>>,
    {
        let mut ctx = NamingContext::new()
            .with_var(RELEASE_GROUP, source.release_group.as_deref())
            .with_var(EPISODE_NAME, Some(source.episode_title.as_str()))
            .with_var(
                RESOLUTION_WIDTH,
                encoded.resolution.width.map(|w| w.to_string()).as_deref(),
            )
            .with_var(
                RESOLUTION_HEIGHT,
                encoded.resolution.height.map(|h| h.to_string()).as_deref(),
            )
            .with_var(
                TAGS,
                Some(source.non_omittable_tags.join(&preset.tag_divider).as_str()),
            );

        if template.contains(&placeholder(CRC32)) {
            ctx.set(CRC32, crc32()?);
        }

        Ok(ctx)
    }

    /// Add a variable.
    pub fn with_var(mut self, key: &str, value: Option<&str>) -> Self {
        self.set(key, value.map(str::to_string));
        self
    }

    /// Set a variable, replacing any earlier value.
    pub fn set(&mut self, key: &str, value: Option<String>) {
        match self.vars.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.vars.push((key.to_string(), value)),
        }
    }

    /// Get a variable value. `None` if unset or set to nothing.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Whether `key` has been set, even to nothing.
    pub fn contains(&self, key: &str) -> bool {
        self.vars.iter().any(|(k, _)| k == key)
    }

    /// Render `template`. Returns `None` for an empty template, meaning the
    /// current name should be kept.
    pub fn render(&self, template: &str) -> Option<String> {
        if template.is_empty() {
            return None;
        }

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            rest = &rest[open..];
            match self.match_at(rest) {
                Some((consumed, value)) => {
                    out.push_str(value);
                    rest = &rest[consumed..];
                }
                None => {
                    out.push('{');
                    rest = &rest[1..];
                }
            }
        }
        out.push_str(rest);
        Some(out)
    }

    /// Match a known `{key}` at the start of `text`.
    fn match_at(&self, text: &str) -> Option<(usize, &str)> {
        let close = text.find('}')?;
        let key = &text[1..close];
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| (close + 1, v.as_deref().unwrap_or("")))
    }
}

fn placeholder(key: &str) -> String {
    format!("{{{}}}", key)
}

/// Rename `file` according to `template`.
///
/// The original extension is kept. With an empty template, a template that
/// renders to blank text, or when the new name equals the old one, `file` is
/// returned unchanged. With `perform` false the new path is computed but
/// nothing is touched on disk.
///
/// # Errors
///
/// Returns [`Error::RenameConflict`] if a different file already exists at
/// the target; the source is left in place.
pub fn rename_encoded_file(
    template: &str,
    file: &Path,
    ctx: &NamingContext,
    perform: bool,
) -> Result<PathBuf> {
    let Some(stem) = ctx.render(template).filter(|s| !s.trim().is_empty()) else {
        return Ok(file.to_path_buf());
    };

    let file_name = match file.extension() {
        Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
        None => stem,
    };
    let target = file.with_file_name(file_name);
    if target == file {
        return Ok(target);
    }

    if perform {
        #[cfg(feature = "tracing")]
        tracing::info!("Renaming {:?} -> {:?}", file, target);

        if target.exists() && same_file(file, &target) {
            std::fs::rename(file, &target)?;
        } else {
            rename_no_clobber(file, &target)?;
        }
    }

    Ok(target)
}

fn conflict(from: &Path, to: &Path) -> Error {
    Error::RenameConflict {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    }
}

/// Move `from` to `to`, failing if `to` exists.
///
/// On Unix the new link is created first, so a destination that appears
/// concurrently is never replaced. Filesystems without hard links fall back
/// to check-then-rename.
#[cfg(unix)]
fn rename_no_clobber(from: &Path, to: &Path) -> Result<()> {
    match std::fs::hard_link(from, to) {
        Ok(()) => {
            std::fs::remove_file(from)?;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(conflict(from, to)),
        Err(_) => {
            if to.exists() {
                return Err(conflict(from, to));
            }
            std::fs::rename(from, to)?;
            Ok(())
        }
    }
}

/// Move `from` to `to`, failing if `to` exists. A destination created between
/// the check and the rename is replaced.
#[cfg(not(unix))]
fn rename_no_clobber(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        return Err(conflict(from, to));
    }
    std::fs::rename(from, to)?;
    Ok(())
}

/// Case-only renames on case-insensitive filesystems resolve to one file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
