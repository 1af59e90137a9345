use thiserror::Error;

#[derive(Error, Debug)]
pub enum TripwireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}
