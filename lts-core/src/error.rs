use std::path::PathBuf;

use thiserror::Error;

/// All errors produced by lts-core.
///
/// Every variant except `Inference` is a setup-time failure: the engine never
/// starts rendering after one of them is returned.
#[derive(Debug, Error)]
pub enum LtsError {
    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("failed to load source {path}: {reason}")]
    SourceLoad { path: PathBuf, reason: String },

    #[error("bounds violation: {0}")]
    BoundsViolation(String),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LtsError {
    pub(crate) fn source_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LtsError>;
