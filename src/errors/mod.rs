use crate::api::errors::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Model API error: {0}")]
    Api(#[from] ApiError),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("API key is required (set one with `pasteup config --set-api-key ...`)")]
    MissingApiKey,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Revert error: {0}")]
    Revert(String),
    #[error("Workspace root does not exist: {0}")]
    MissingRoot(String),
    #[error("Run aborted: {0}")]
    Aborted(String),
}
