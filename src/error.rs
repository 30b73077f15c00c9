use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GbRegionsError {
    #[error("{0}")]
    String(String),
    #[error("Could not write '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Import(#[from] anyhow::Error),
}

impl From<String> for GbRegionsError {
    fn from(err: String) -> Self {
        GbRegionsError::String(err)
    }
}

pub type Result<T> = std::result::Result<T, GbRegionsError>;
