use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::compose::effects::EffectKind;

/// Library error type for composition operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An image reference could not be turned into pixels.
    #[error("failed to resolve {phase} image {reference:?}")]
    Resolution {
        reference: String,
        phase: &'static str,
        #[source]
        source: ResolveError,
    },

    /// A structurally required request field is missing or unusable.
    #[error("invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    /// The result could not be written.
    #[error("failed to save image to {}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    #[error("resize error: {0}")]
    Resize(anyhow::Error),

    /// A blocking render task panicked or was cancelled.
    #[error("render worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Why an image reference could not be resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{reference:?} not found (tried {})", display_paths(.tried))]
    NotFound {
        reference: String,
        tried: Vec<PathBuf>,
    },

    #[error("fetching {url} failed: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("fetching {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("fetching {url} was cancelled")]
    Cancelled { url: String },

    #[error("failed to decode {reference:?}")]
    Decode {
        reference: String,
        #[source]
        source: image::ImageError,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// An effect failed mid-render; the layer was drawn as plain text instead.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{effect} effect degraded to plain text: {reason}")]
pub struct RenderDegradation {
    pub effect: EffectKind,
    pub reason: String,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
