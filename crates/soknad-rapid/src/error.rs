//! Error type for `soknad-rapid`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("packet is not a JSON object")]
  IkkeObjekt,

  #[error("packet is missing required key {0:?}")]
  ManglerNokkel(String),

  #[error("packet key {nokkel:?} has unexpected value {fikk}")]
  UventetVerdi { nokkel: String, fikk: String },

  #[error("packet carries forbidden key {0:?}")]
  ForbudtNokkel(String),

  #[error("packet key {nokkel:?} is not a {ventet}")]
  UgyldigType {
    nokkel: String,
    ventet: &'static str,
  },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("core error: {0}")]
  Core(#[from] soknad_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
