use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScamSignalError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Analysis lock conflict: another aggregation run is in progress")]
    AnalysisLockConflict,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
