//! Error type for `soknad-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] soknad_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown stored value: {0}")]
  UkjentVerdi(String),

  /// Optimistic-lock failure: another writer saved the søknad after we
  /// loaded it. The caller should reload and retry.
  #[error("søknad {0} was modified concurrently")]
  Konflikt(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
