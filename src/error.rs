use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;
use crate::postprocess::PostProcessError;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("Engine unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("Cannot read prompts file {}: {source}", .path.display())]
    Catalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Render failed: {0}")]
    Render(#[from] EngineError),

    #[error("Engine returned an undecodable image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Post-processing failed: {0}")]
    PostProcess(#[from] PostProcessError),

    #[error("Cannot write {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a per-item failure, recorded in the session summary.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// The engine refused, timed out or could not be reached.
    Render(String),
    /// The engine answered with bytes that are not an image.
    Decode(String),
    PostProcess(String),
    /// The asset could not be written; the item is not complete.
    Persist(String),
}

impl From<&ForgeError> for FailureKind {
    fn from(err: &ForgeError) -> Self {
        let msg = err.to_string();
        match err {
            ForgeError::Decode(_) => FailureKind::Decode(msg),
            ForgeError::Render(EngineError::Decode(_)) => FailureKind::Decode(msg),
            ForgeError::PostProcess(_) => FailureKind::PostProcess(msg),
            ForgeError::Persist { .. } | ForgeError::Io(_) => FailureKind::Persist(msg),
            _ => FailureKind::Render(msg),
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Render(msg) => write!(f, "render failure: {msg}"),
            FailureKind::Decode(msg) => write!(f, "decode failure: {msg}"),
            FailureKind::PostProcess(msg) => write!(f, "post-process failure: {msg}"),
            FailureKind::Persist(msg) => write!(f, "persist failure: {msg}"),
        }
    }
}
