use thiserror::Error;

/// Errors surfaced by the storage adapter.
///
/// The connection state machine never forwards this type's `Display` text to
/// the wire; every variant is mapped to one of the three fixed
/// `SERVER_ERROR ...` lines before a byte is written to a client.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("{0}")]
    Sqlite(Box<sqlx::Error>),
    #[error("{0}")]
    String(&'static str),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::Sqlite(Box::new(e))
    }
}

impl From<&'static str> for CacheError {
    fn from(e: &'static str) -> Self {
        CacheError::String(e)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
