//! Error type for `vigil-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] vigil_core::Error),

  #[error("database error: {0}")]
  Database(#[source] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored discriminant no longer matches any known variant.
  #[error("decode error: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised inside a connection closure travel back boxed in
/// `tokio_rusqlite::Error::Other`; unwrap them so domain errors keep their
/// variant.
impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
        Ok(err) => *err,
        Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
      },
      other => Error::Database(other),
    }
  }
}

impl From<Error> for tokio_rusqlite::Error {
  fn from(e: Error) -> Self { tokio_rusqlite::Error::Other(Box::new(e)) }
}

/// Abort a connection closure with a domain error.
pub(crate) fn reject(e: vigil_core::Error) -> tokio_rusqlite::Error { Error::Core(e).into() }

impl From<Error> for vigil_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(inner) => inner,
      Error::Json(inner) => vigil_core::Error::Serialization(inner),
      other => vigil_core::Error::StorageUnavailable(Box::new(other)),
    }
  }
}
