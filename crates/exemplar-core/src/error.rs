//! Error type shared by the extraction and fidelity pipelines.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias using [`ExemplarError`].
pub type Result<T> = std::result::Result<T, ExemplarError>;

#[derive(Debug, Error)]
pub enum ExemplarError {
    /// Missing required input or malformed catalog schema. Aborts the run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Degenerate bounding box, zero-size window or inverted bounds.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// Too much nodata in a patch, or nothing valid left to summarise.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    #[error("no GeoTIFF found for tile '{tile_id}' in {dir}")]
    TileNotFound { tile_id: String, dir: PathBuf },

    #[error("multiple GeoTIFFs found for tile '{tile_id}': {candidates}")]
    AmbiguousTile { tile_id: String, candidates: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TIFF error in {path}: {message}")]
    Tiff { path: PathBuf, message: String },

    #[error("image error in {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Coarse classification of an error, used for batch summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Geometry,
    DataIntegrity,
    Input,
}

impl ExemplarError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Geometry(_) => ErrorKind::Geometry,
            Self::DataIntegrity(_) => ErrorKind::DataIntegrity,
            Self::TileNotFound { .. }
            | Self::AmbiguousTile { .. }
            | Self::Io { .. }
            | Self::Tiff { .. }
            | Self::Image { .. }
            | Self::Json { .. } => ErrorKind::Input,
        }
    }

    /// True when the error should stop the whole run rather than one record.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn tiff(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Tiff {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(ExemplarError::Configuration("missing".into()).is_fatal());
        assert!(!ExemplarError::Geometry("empty window".into()).is_fatal());
        assert!(!ExemplarError::DataIntegrity("all nodata".into()).is_fatal());
        let lookup = ExemplarError::TileNotFound {
            tile_id: "N27E086".into(),
            dir: PathBuf::from("raw"),
        };
        assert_eq!(lookup.kind(), ErrorKind::Input);
        assert!(!lookup.is_fatal());
    }
}
