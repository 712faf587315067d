use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("{provider} returned HTTP {status}")]
    Provider { provider: String, status: u16 },

    #[error("Failed to parse {provider} response: {message}")]
    Parse { provider: String, message: String },

    #[error("Invalid lyrics query: {0}")]
    InvalidQuery(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
