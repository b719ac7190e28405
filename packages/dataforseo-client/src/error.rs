use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataForSeoError>;

#[derive(Debug, Error)]
pub enum DataForSeoError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DataForSEO API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Response item is missing a task id")]
    MissingTaskId,
}
