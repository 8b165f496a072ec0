//! Reading and writing records as JSON, TOML, YAML, or a binary encoding.
//!
//! Any serde type can opt in with an empty `impl Persist for T {}`. The
//! binary encoding is MessagePack with named fields; `.pkl` and `.pickle`
//! paths are accepted as aliases for it.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};

use crate::FormatError;

/// A supported persistence format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
    Yaml,
    Binary,
}

impl Format {
    /// Picks a format from a path's extension.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::UnknownExtension`] for anything other than
    /// `.json`, `.toml`, `.yml`, `.yaml`, `.pkl`, `.pickle`, `.msgpack`, `.bin`.
    pub fn from_path(path: &Path) -> Result<Self, FormatError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            Some("yml" | "yaml") => Ok(Self::Yaml),
            Some("pkl" | "pickle" | "msgpack" | "bin") => Ok(Self::Binary),
            _ => Err(FormatError::UnknownExtension {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Serialization helpers shared by every persisted record.
///
/// # Errors
///
/// Every method returns a [`FormatError`] describing the encoding, decoding,
/// or I/O failure.
pub trait Persist: Serialize + DeserializeOwned {
    fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn from_json(text: &str) -> Result<Self, FormatError> {
        Ok(serde_json::from_str(text)?)
    }

    fn to_toml(&self) -> Result<String, FormatError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn from_toml(text: &str) -> Result<Self, FormatError> {
        Ok(toml::from_str(text)?)
    }

    fn to_yaml(&self) -> Result<String, FormatError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn from_yaml(text: &str) -> Result<Self, FormatError> {
        Ok(serde_yaml::from_str(text)?)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Decodes text of unknown format, trying JSON, then TOML, then YAML.
    fn from_text(text: &str) -> Result<Self, FormatError> {
        Self::from_json(text)
            .or_else(|_| Self::from_toml(text))
            .or_else(|_| Self::from_yaml(text))
            .map_err(|_| FormatError::Undecodable)
    }

    fn save_json(&self, path: impl AsRef<Path>) -> Result<(), FormatError> {
        write(path.as_ref(), self.to_json()?.as_bytes())
    }

    fn load_json(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        Self::from_json(&read_text(path.as_ref())?)
    }

    fn save_toml(&self, path: impl AsRef<Path>) -> Result<(), FormatError> {
        write(path.as_ref(), self.to_toml()?.as_bytes())
    }

    fn load_toml(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        Self::from_toml(&read_text(path.as_ref())?)
    }

    fn save_yaml(&self, path: impl AsRef<Path>) -> Result<(), FormatError> {
        write(path.as_ref(), self.to_yaml()?.as_bytes())
    }

    fn load_yaml(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        Self::from_yaml(&read_text(path.as_ref())?)
    }

    fn save_bytes(&self, path: impl AsRef<Path>) -> Result<(), FormatError> {
        write(path.as_ref(), &self.to_bytes()?)
    }

    fn load_bytes(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| io_error(path, source))?;
        Self::from_bytes(&bytes)
    }

    /// Writes in the format implied by the path's extension.
    fn save(&self, path: impl AsRef<Path>) -> Result<(), FormatError> {
        let path = path.as_ref();
        match Format::from_path(path)? {
            Format::Json => self.save_json(path),
            Format::Toml => self.save_toml(path),
            Format::Yaml => self.save_yaml(path),
            Format::Binary => self.save_bytes(path),
        }
    }

    /// Reads in the format implied by the path's extension.
    fn load(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let path = path.as_ref();
        match Format::from_path(path)? {
            Format::Json => Self::load_json(path),
            Format::Toml => Self::load_toml(path),
            Format::Yaml => Self::load_yaml(path),
            Format::Binary => Self::load_bytes(path),
        }
    }
}

fn read_text(path: &Path) -> Result<String, FormatError> {
    fs::read_to_string(path).map_err(|source| io_error(path, source))
}

fn write(path: &Path, contents: &[u8]) -> Result<(), FormatError> {
    fs::write(path, contents).map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> FormatError {
    FormatError::Io {
        path: PathBuf::from(path),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_follow_extensions() {
        let cases = [
            ("run.json", Format::Json),
            ("run.TOML", Format::Toml),
            ("run.yml", Format::Yaml),
            ("run.yaml", Format::Yaml),
            ("run.pkl", Format::Binary),
            ("run.pickle", Format::Binary),
            ("run.msgpack", Format::Binary),
        ];
        for (path, format) in cases {
            assert_eq!(Format::from_path(Path::new(path)).unwrap(), format, "{path}");
        }
    }

    #[test]
    fn unknown_extension_is_an_error() {
        for path in ["run.csv", "run"] {
            assert!(matches!(
                Format::from_path(Path::new(path)),
                Err(FormatError::UnknownExtension { .. })
            ));
        }
    }
}
