// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VqError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg/FFprobe command failed: {0}")]
    Command(String),

    #[error("Failed to parse command output: {0}")]
    Parse(String),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input video file not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Could not open video file {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No frame pairs could be compared")]
    EmptyComparison,
}

// Define a standard Result type for the crate
pub type Result<T> = std::result::Result<T, VqError>;
