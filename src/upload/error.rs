use std::fmt;
use std::path::PathBuf;

/// Raised by an engine when it refuses to start an upload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("Invalid file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    #[error("Missing some arguments. {0}")]
    MissingArgument(String),

    #[error("Invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    ServerUrl,
    FilePath,
    FieldName,
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DraftField::ServerUrl => "server URL",
            DraftField::FilePath => "file to upload",
            DraftField::FieldName => "parameter name",
        };
        f.write_str(name)
    }
}

/// Draft rejected before reaching the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please fill in: {}", join_fields(.fields))]
    MissingFields { fields: Vec<DraftField> },

    #[error("Cannot read {path}: {reason}")]
    UnreadableFile { path: PathBuf, reason: String },
}

impl ValidationError {
    /// Fields the user has to fix.
    pub fn fields(&self) -> Vec<DraftField> {
        match self {
            ValidationError::MissingFields { fields } => fields.clone(),
            ValidationError::UnreadableFile { .. } => vec![DraftField::FilePath],
        }
    }
}

fn join_fields(fields: &[DraftField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Everything that can stop an upload from starting. Its message is what the
/// user sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Start(#[from] StartError),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineInitError {
    #[error("failed to build upload runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
