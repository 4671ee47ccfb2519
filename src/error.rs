// src/error.rs
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NwbError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid meta file {}: {reason}", .path.display())]
    InvalidMeta { path: PathBuf, reason: String },

    #[error("missing meta key: {0}")]
    MissingMetaKey(String),

    #[error("binary file not found: {}", .0.display())]
    BinaryNotFound(PathBuf),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("frame range {start}..{end} out of bounds for recording of {num_frames} frames")]
    FrameRangeOutOfBounds { start: u64, end: u64, num_frames: u64 },

    #[error("object already exists in NWB file: {0}")]
    DuplicateObject(String),

    #[error("object not found in NWB file: {0}")]
    ObjectNotFound(String),

    #[error("metadata validation failed: {0}")]
    InvalidMetadata(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("conversion worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, NwbError>;
