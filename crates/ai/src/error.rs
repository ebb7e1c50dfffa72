use operation_layer::InvalidInput;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    #[error("failed to load model {model}: {source:#}")]
    ModelLoad {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{model} processing failed: {source:#}")]
    Processing {
        model: String,
        #[source]
        source: anyhow::Error,
    },
}
