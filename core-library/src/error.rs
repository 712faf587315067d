use thiserror::Error;

/// Catalog failures.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Catalog database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No {kind} with id {id} in the catalog")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Catalog schema migration failed: {0}")]
    Migration(String),
}

impl LibraryError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
