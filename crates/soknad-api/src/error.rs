//! API error type with RFC 7807 problem bodies.
//!
//! Every failure category maps to a stable `type` URN so clients can branch
//! on it without string-matching the detail text.

use axum::{
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::mediator::MediatorError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthenticated: {0}")]
  IkkeAutentisert(String),

  #[error("authenticated user does not own the søknad")]
  IkkeEier,

  #[error("not found: {0}")]
  IkkeFunnet(String),

  #[error("conflict: {0}")]
  Konflikt(String),

  #[error("bad request: {0}")]
  UgyldigForesporsel(String),

  #[error("internal error: {0}")]
  Intern(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Serialize)]
struct Problem {
  #[serde(rename = "type")]
  type_urn: &'static str,
  title:    &'static str,
  status:   u16,
  detail:   String,
}

impl ApiError {
  fn problem(&self) -> (StatusCode, Problem) {
    let (status, type_urn, title) = match self {
      ApiError::IkkeAutentisert(_) => (
        StatusCode::UNAUTHORIZED,
        "urn:soknad:feil:ikke-autentisert",
        "Mangler gyldig token",
      ),
      ApiError::IkkeEier => (
        StatusCode::FORBIDDEN,
        "urn:soknad:feil:ikke-eier",
        "Ikke eier av søknaden",
      ),
      ApiError::IkkeFunnet(_) => (
        StatusCode::NOT_FOUND,
        "urn:soknad:feil:ikke-funnet",
        "Ressursen finnes ikke",
      ),
      ApiError::Konflikt(_) => (
        StatusCode::CONFLICT,
        "urn:soknad:feil:ugyldig-tilstand",
        "Handlingen er ikke gyldig i søknadens tilstand",
      ),
      ApiError::UgyldigForesporsel(_) => (
        StatusCode::BAD_REQUEST,
        "urn:soknad:feil:ugyldig-foresporsel",
        "Ugyldig forespørsel",
      ),
      ApiError::Intern(_) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        "urn:soknad:feil:intern",
        "Intern feil",
      ),
    };
    (
      status,
      Problem {
        type_urn,
        title,
        status: status.as_u16(),
        detail: self.to_string(),
      },
    )
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, problem) = self.problem();
    (
      status,
      [(header::CONTENT_TYPE, "application/problem+json")],
      Json(problem),
    )
      .into_response()
  }
}

impl From<MediatorError> for ApiError {
  fn from(feil: MediatorError) -> Self {
    use soknad_core::Error as Kjerne;
    match feil {
      MediatorError::Core(kjerne) => match kjerne {
        Kjerne::SoknadIkkeFunnet(_) | Kjerne::JournalpostIkkeFunnet(_) => {
          ApiError::IkkeFunnet(kjerne.to_string())
        }
        Kjerne::AlleredePaabegynt { .. }
        | Kjerne::SoknadLaast(_)
        | Kjerne::UgyldigTilstand { .. }
        | Kjerne::KanIkkeSlettes(_)
        | Kjerne::DokumentkravIkkeKomplett(_)
        | Kjerne::EttersendingUtenJournalforing(_) => {
          ApiError::Konflikt(kjerne.to_string())
        }
        Kjerne::ManglerProsessversjon(_) | Kjerne::Serialization(_) => {
          ApiError::Intern(Box::new(kjerne))
        }
      },
      MediatorError::PersonIkkeFunnet(_) => {
        ApiError::IkkeFunnet(feil.to_string())
      }
      MediatorError::Store(_) | MediatorError::Rapid(_) => {
        ApiError::Intern(Box::new(feil))
      }
    }
  }
}
