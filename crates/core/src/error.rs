use std::{error::Error as StdError, io, path::PathBuf};

/// A type-erased error that crosses an API boundary untouched.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors raised by the optimizer layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No optimizer is registered under the requested identifier.
    #[error("unknown optimizer `{name}`")]
    UnknownOptimizer { name: String },

    /// The optimizer's type is not registered under any identifier.
    #[error("optimizer `{type_name}` is not registered")]
    UnregisteredInstance { type_name: &'static str },

    /// An option holds a value of the wrong shape for its consumer.
    #[error("option `{key}` must be {expected}")]
    InvalidOption { key: String, expected: &'static str },

    /// The result has no field that accepts the given key and value.
    #[error("result field `{key}` cannot hold the given value")]
    InvalidField { key: String },

    /// The wrapped backend failed; the original error is the source.
    #[error("optimizer backend failed: {0}")]
    Backend(#[source] BoxError),
}

impl Error {
    /// Wraps a backend failure without translating it.
    pub fn backend(error: impl Into<BoxError>) -> Self {
        Self::Backend(error.into())
    }
}

/// Errors raised while persisting or loading records.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("unrecognized file extension for `{}`", path.display())]
    UnknownExtension { path: PathBuf },

    #[error("text is not valid JSON, TOML, or YAML")]
    Undecodable,

    #[error("I/O error on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    #[error("TOML decode error")]
    TomlDecode(#[from] toml::de::Error),

    #[error("TOML encode error")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("YAML error")]
    Yaml(#[from] serde_yaml::Error),

    #[error("binary decode error")]
    BinaryDecode(#[from] rmp_serde::decode::Error),

    #[error("binary encode error")]
    BinaryEncode(#[from] rmp_serde::encode::Error),
}
