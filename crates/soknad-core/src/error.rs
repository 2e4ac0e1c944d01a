//! Error types for `soknad-core`.
//!
//! Every variant except [`Error::Serialization`] is a severe validation
//! failure: the event that triggered it must be discarded in full, and the
//! caller must not persist the aggregate it was dispatched to.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("søknad not found: {0}")]
  SoknadIkkeFunnet(Uuid),

  #[error("no søknad with journalpost {0}")]
  JournalpostIkkeFunnet(String),

  #[error("person {ident} already has søknad {soknad_id} in progress")]
  AlleredePaabegynt { ident: String, soknad_id: Uuid },

  #[error("søknad {0} is submitted and can no longer be edited")]
  SoknadLaast(Uuid),

  #[error("event {hendelse} is not applicable in state {tilstand}")]
  UgyldigTilstand { hendelse: String, tilstand: String },

  #[error("søknad {0} cannot be deleted after submission")]
  KanIkkeSlettes(Uuid),

  #[error("søknad {0} has no resolvable prosessversjon")]
  ManglerProsessversjon(Uuid),

  #[error("søknad {0} has unanswered dokumentkrav")]
  DokumentkravIkkeKomplett(Uuid),

  #[error("innsending {0} is not journalført; ettersending is not possible")]
  EttersendingUtenJournalforing(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Whether this error is a severe validation failure that must abort the
  /// current event without persisting any mutation.
  pub fn er_alvorlig(&self) -> bool {
    !matches!(self, Error::Serialization(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
