use thiserror::Error;

/// Failures of the storage layer and the log built on it
#[derive(Error, Debug)]
pub enum PersistError {
    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[cfg(feature = "mongodb")]
    #[error("Could not encode document: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("Thread {0} does not exist")]
    ThreadNotFound(String),

    #[error("Message {0} does not exist")]
    MessageNotFound(String),

    /// Backend unreachable, or not compiled in
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PersistError>;
