use std::path::PathBuf;

/// Typed failures raised by the indexer and the loader.
///
/// Functions in this crate return `anyhow::Result`; these values travel inside
/// it and can be recovered with `downcast_ref::<DataError>()`, or by walking
/// `Error::chain()` when context has been attached on top.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Bad root path, missing or empty required split, invalid parameters.
    /// Always fatal at construction time.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A record's image could not be read or decoded.
    #[error("failed to decode image {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    /// A class subdirectory whose name is outside the closed label set.
    #[error("unrecognized class directory '{name}' at {}", .path.display())]
    Label { name: String, path: PathBuf },
}

impl DataError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Builds a `Decode` error keeping the full context chain of `err`.
    pub fn decode(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::Decode {
            path: path.into(),
            reason: format!("{:#}", err),
        }
    }

    /// Path of the offending record, if this error names one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Config { .. } => None,
            Self::Decode { path, .. } | Self::Label { path, .. } => Some(path),
        }
    }

    /// Finds the `DataError` carried by an `anyhow` error, whether it is the
    /// root cause, a context layer, or a source further down the chain.
    pub fn find(err: &anyhow::Error) -> Option<&DataError> {
        err.downcast_ref::<DataError>()
            .or_else(|| err.chain().find_map(|cause| cause.downcast_ref::<DataError>()))
    }
}
