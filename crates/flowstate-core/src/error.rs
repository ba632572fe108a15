use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowstateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
