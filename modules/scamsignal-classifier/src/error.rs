use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier script not found at {0}")]
    ScriptNotFound(PathBuf),

    #[error("Failed to start classifier process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Classifier exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Classifier returned empty output")]
    EmptyOutput,

    #[error("Failed to parse classifier output: {0}")]
    Malformed(String),

    #[error("Classifier pipeline error: {0}")]
    Pipeline(String),

    #[error("Classifier timed out after {0}s")]
    Timeout(u64),

    #[error("Classifier returned {received} results for {sent} incidents")]
    CardinalityMismatch { sent: usize, received: usize },

    #[error("Classifier HTTP error: {0}")]
    Http(String),
}
