use ai::AiError;
use file_handler::FileHandlerError;
use operation_layer::InvalidInput;
use std::path::PathBuf;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    #[error(transparent)]
    Model(#[from] AiError),

    #[error(transparent)]
    File(#[from] FileHandlerError),

    /// The backend failed; the detail was logged where it happened.
    #[error("{0}, see the log for details")]
    Processing(String),

    #[error("a request is already being processed")]
    Busy,

    #[error("processing worker failed: {0}")]
    Worker(String),

    #[error("failed to read config file {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to open window: {0}")]
    Ui(String),
}
