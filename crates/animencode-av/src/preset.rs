//! Encode presets loaded from a preset directory.
//!
//! A preset directory may contain:
//!
//! - `basic.json` - per-stream-kind ffmpeg options and scalar switches
//! - `extra_param.txt` - extra arguments appended before the output path
//! - `naming.txt` - the output naming template
//! - `tag_divider.txt` - separator used to join `{tags}`
//!
//! Every file is optional; a missing file keeps the default.

use crate::{Error, Result};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Name reported for presets without a `preset_name`.
pub const DEFAULT_PRESET_NAME: &str = "FFMPEG DEFAULT";

/// Output extension when the preset does not set `container`.
pub const DEFAULT_CONTAINER: &str = ".mkv";

/// Ordered `option -> value` pairs for one stream kind.
///
/// Keeps the order of `basic.json`, so compiled commands list options the
/// way the preset author wrote them. A `null` value means "declared but not
/// passed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionGroup(Vec<(String, Option<String>)>);

impl OptionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an option, replacing an earlier value for the same key in place.
    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.set(key, Some(value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Options that carry a value, in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
    }
}

impl<'de> Deserialize<'de> for OptionGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct GroupVisitor;

        impl<'de> Visitor<'de> for GroupVisitor {
            type Value = OptionGroup;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of ffmpeg options to scalar values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut group = OptionGroup::new();
                while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
                    let value = match value {
                        serde_json::Value::Null => None,
                        serde_json::Value::String(s) => Some(s),
                        serde_json::Value::Number(n) => Some(n.to_string()),
                        serde_json::Value::Bool(b) => Some(b.to_string()),
                        other => {
                            return Err(de::Error::custom(format!(
                                "option {:?} must be a scalar, got {}",
                                key, other
                            )))
                        }
                    };
                    group.set(key, value);
                }
                Ok(group)
            }
        }

        deserializer.deserialize_map(GroupVisitor)
    }
}

impl Serialize for OptionGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Contents of `basic.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    /// Options placed before `-i`.
    pub input: OptionGroup,
    pub video: OptionGroup,
    pub audio: OptionGroup,
    pub subtitle: OptionGroup,
    /// Global output options placed after stream mapping.
    pub other: OptionGroup,
    /// Copy font and other attachments.
    pub keep_attachments: bool,
    /// Keep chapter markers.
    pub keep_chapters: bool,
    /// Output extension, e.g. `.mp4`.
    pub container: Option<String>,
    pub preset_name: Option<String>,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            input: OptionGroup::new(),
            video: OptionGroup::new(),
            audio: OptionGroup::new(),
            subtitle: OptionGroup::new(),
            other: OptionGroup::new(),
            keep_attachments: true,
            keep_chapters: true,
            container: None,
            preset_name: None,
        }
    }
}

/// Everything needed to compile an encode and name its output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodePreset {
    /// Directory the preset was loaded from, if any.
    pub dir: Option<PathBuf>,
    pub name: String,
    pub stream_params: StreamParams,
    pub extra_options: Vec<String>,
    /// Naming template; empty keeps the encoder's file name.
    pub naming: String,
    pub tag_divider: String,
    pub container_extension: String,
}

impl Default for EncodePreset {
    fn default() -> Self {
        Self {
            dir: None,
            name: DEFAULT_PRESET_NAME.to_string(),
            stream_params: StreamParams::default(),
            extra_options: Vec::new(),
            naming: String::new(),
            tag_divider: " ".to_string(),
            container_extension: DEFAULT_CONTAINER.to_string(),
        }
    }
}

impl EncodePreset {
    /// Load a preset directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PresetNotFound`] if `dir` is not a directory and
    /// [`Error::InvalidPreset`] if `basic.json` cannot be parsed.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::PresetNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut preset = EncodePreset {
            dir: Some(dir.to_path_buf()),
            ..EncodePreset::default()
        };

        if let Some(naming) = read_optional(&dir.join("naming.txt"))? {
            preset.naming = naming.trim().to_string();
        }

        if let Some(divider) = read_optional(&dir.join("tag_divider.txt"))? {
            preset.tag_divider = divider.trim().to_string();
        }

        let basic = dir.join("basic.json");
        if let Some(json) = read_optional(&basic)? {
            let params: StreamParams =
                serde_json::from_str(&json).map_err(|e| Error::InvalidPreset {
                    path: basic.clone(),
                    message: e.to_string(),
                })?;
            if let Some(name) = &params.preset_name {
                preset.name = name.clone();
            }
            if let Some(container) = &params.container {
                preset.container_extension = normalize_extension(container);
            }
            preset.stream_params = params;
        }

        if let Some(extra) = read_optional(&dir.join("extra_param.txt"))? {
            preset.extra_options = split_extra_options(&extra);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Loaded preset {:?} from {:?}", preset.name, dir);

        Ok(preset)
    }

    /// Whether any stream options were configured.
    pub fn has_stream_params(&self) -> bool {
        self.stream_params != StreamParams::default()
    }
}

impl fmt::Display for EncodePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Preset:      {}", self.name)?;
        if let Some(dir) = &self.dir {
            writeln!(f, "Directory:   {}", dir.display())?;
        }
        writeln!(f, "Container:   {}", self.container_extension)?;
        writeln!(f, "Naming:      {}", self.naming)?;
        writeln!(f, "Tag divider: {:?}", self.tag_divider)?;
        let groups = [
            ("input", &self.stream_params.input),
            ("video", &self.stream_params.video),
            ("audio", &self.stream_params.audio),
            ("subtitle", &self.stream_params.subtitle),
            ("other", &self.stream_params.other),
        ];
        for (label, group) in groups {
            let opts: Vec<String> = group.values().map(|(k, v)| format!("-{} {}", k, v)).collect();
            writeln!(f, "{:<12} {}", format!("{}:", label), opts.join(" "))?;
        }
        writeln!(
            f,
            "Attachments: {}",
            if self.stream_params.keep_attachments { "keep" } else { "drop" }
        )?;
        writeln!(
            f,
            "Chapters:    {}",
            if self.stream_params.keep_chapters { "keep" } else { "drop" }
        )?;
        write!(f, "Extra:       {}", self.extra_options.join(" "))
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if path.is_file() {
        Ok(Some(fs::read_to_string(path)?))
    } else {
        Ok(None)
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{}", ext)
    }
}

/// Split `extra_param.txt` into arguments.
///
/// Tokens are whitespace separated. A run of tokens from one starting with
/// `"` to one ending with `"` becomes a single argument joined by single
/// spaces, quotes removed. An unclosed run is kept as one argument.
pub fn split_extra_options(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut quoted: Option<Vec<&str>> = None;

    for token in text.split_whitespace() {
        if quoted.is_none() && token.starts_with('"') {
            quoted = Some(Vec::new());
        }
        match quoted.as_mut() {
            Some(buffer) => {
                buffer.push(token.trim_matches('"'));
                let closes = token.ends_with('"') && (buffer.len() > 1 || token.len() > 1);
                if closes {
                    args.push(buffer.join(" "));
                    quoted = None;
                }
            }
            None => args.push(token.to_string()),
        }
    }

    if let Some(buffer) = quoted {
        args.push(buffer.join(" "));
    }
    args
}
