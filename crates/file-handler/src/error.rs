use std::path::PathBuf;
use thiserror::Error;

pub type FileHandlerResult<T> = std::result::Result<T, FileHandlerError>;

#[derive(Error, Debug)]
pub enum FileHandlerError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
