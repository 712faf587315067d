use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A setting is out of range or the logging setup was rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The host did not inject a required bridge and no fallback exists.
    #[error("Host capability `{capability}` missing: {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
