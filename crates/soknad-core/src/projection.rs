//! Read-side projections over the aggregate.
//!
//! Each read use-case gets its own projector function that traverses the
//! aggregate in a fixed order (person, then each søknad, then its
//! innsending chain) and extracts a purpose-built view. This is the only
//! sanctioned way for the outside to read aggregate state; internal field
//! layout never leaks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  innsending::{Innsending, InnsendingTilstand, InnsendingType},
  person::Person,
  soknad::Soknad,
};

// ─── Status view ─────────────────────────────────────────────────────────────

/// The status endpoint's view of one søknad.
#[derive(Debug, Clone, Serialize)]
pub struct SoknadStatus {
  pub soknad_id:          Uuid,
  pub tilstand:           &'static str,
  pub opprettet:          DateTime<Utc>,
  pub innsendt_tidspunkt: Option<DateTime<Utc>>,
  pub journalpost_id:     Option<String>,
  pub ettersendinger:     Vec<InnsendingStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InnsendingStatus {
  pub innsending_id: Uuid,
  pub tilstand:      InnsendingTilstand,
  pub innsendt:      DateTime<Utc>,
}

pub fn status(person: &Person, soknad_id: Uuid) -> Option<SoknadStatus> {
  let soknad = person
    .soknader()
    .iter()
    .find(|s| s.soknad_id() == soknad_id)?;
  Some(status_for(soknad))
}

fn status_for(soknad: &Soknad) -> SoknadStatus {
  let innsending = soknad.innsending();
  SoknadStatus {
    soknad_id:          soknad.soknad_id(),
    tilstand:           soknad.tilstand().navn(),
    opprettet:          soknad.opprettet(),
    innsendt_tidspunkt: soknad.innsendt_tidspunkt(),
    journalpost_id:     innsending
      .and_then(|i| i.journalpost_id())
      .map(str::to_string),
    ettersendinger:     innsending
      .map(|i| i.ettersendinger().iter().map(innsending_status).collect())
      .unwrap_or_default(),
  }
}

fn innsending_status(innsending: &Innsending) -> InnsendingStatus {
  InnsendingStatus {
    innsending_id: innsending.innsending_id(),
    tilstand:      innsending.tilstand(),
    innsendt:      innsending.innsendt(),
  }
}

// ─── "Mine søknader" listing ─────────────────────────────────────────────────

/// Summary row for an unsubmitted søknad. Also produced directly by the
/// store for the resume flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaabegyntSoknad {
  pub soknad_id:             Uuid,
  pub opprettet:             DateTime<Utc>,
  pub sist_endret_av_bruker: DateTime<Utc>,
  pub spraak:                String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InnsendtSoknad {
  pub soknad_id:          Uuid,
  pub innsendt_tidspunkt: DateTime<Utc>,
  pub tilstand:           &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MineSoknader {
  pub paabegynt: Option<PaabegyntSoknad>,
  pub innsendte: Vec<InnsendtSoknad>,
}

/// Everything the "my applications" page needs: the resumable søknad, if
/// any, plus submissions from `fom` onwards.
pub fn mine_soknader(
  person: &Person,
  fom: Option<DateTime<Utc>>,
) -> MineSoknader {
  let mut paabegynt = None;
  let mut innsendte = Vec::new();

  for soknad in person.soknader() {
    if soknad.tilstand().er_aktiv() {
      paabegynt = Some(PaabegyntSoknad {
        soknad_id:             soknad.soknad_id(),
        opprettet:             soknad.opprettet(),
        sist_endret_av_bruker: soknad.sist_endret_av_bruker(),
        spraak:                soknad.spraak().to_string(),
      });
      continue;
    }
    if let Some(innsendt) = soknad.innsendt_tidspunkt() {
      if fom.is_none_or(|fom| innsendt >= fom) {
        innsendte.push(InnsendtSoknad {
          soknad_id:          soknad.soknad_id(),
          innsendt_tidspunkt: innsendt,
          tilstand:           soknad.tilstand().navn(),
        });
      }
    }
  }
  MineSoknader {
    paabegynt,
    innsendte,
  }
}

// ─── Rapid payloads ──────────────────────────────────────────────────────────

/// The data payload published with `soknad_innsendt` events: the full
/// document inventory of the primary innsending.
#[derive(Debug, Clone, Serialize)]
pub struct InnsendingDokumenter {
  pub innsending_id:   Uuid,
  pub innsending_type: InnsendingType,
  pub skjemakode:      String,
  pub dokumenter:      Vec<serde_json::Value>,
}

pub fn innsending_dokumenter(
  person: &Person,
  soknad_id: Uuid,
) -> Option<InnsendingDokumenter> {
  let innsending = person
    .soknader()
    .iter()
    .find(|s| s.soknad_id() == soknad_id)?
    .innsending()?;
  Some(InnsendingDokumenter {
    innsending_id:   innsending.innsending_id(),
    innsending_type: innsending.innsending_type(),
    skjemakode:      innsending.skjemakode().to_string(),
    dokumenter:      innsending
      .dokumenter()
      .iter()
      .chain(innsending.hoveddokument())
      .map(|d| serde_json::json!(d))
      .collect(),
  })
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;
  use crate::{
    hendelse::{OnskeOmNySoknadHendelse, SoknadOpprettetHendelse},
    soknad::Prosessversjon,
  };

  fn person_med_soknad() -> (Person, Uuid) {
    let mut person = Person::ny("12345678912");
    let mut onske =
      OnskeOmNySoknadHendelse::ny("12345678912", "NB", "Dagpenger");
    let soknad_id = onske.soknad_id;
    person.handter_onske(&mut onske).unwrap();
    let mut opprettet = SoknadOpprettetHendelse::ny(
      "12345678912",
      soknad_id,
      Uuid::new_v4(),
      Prosessversjon {
        navn:    "Dagpenger".to_string(),
        versjon: 1,
      },
    );
    person.handter_opprettet(&mut opprettet).unwrap();
    (person, soknad_id)
  }

  #[test]
  fn status_reflects_current_state() {
    let (person, soknad_id) = person_med_soknad();
    let status = status(&person, soknad_id).unwrap();
    assert_eq!(status.tilstand, "Påbegynt");
    assert!(status.journalpost_id.is_none());
  }

  #[test]
  fn status_for_unknown_soknad_is_none() {
    let (person, _) = person_med_soknad();
    assert!(status(&person, Uuid::new_v4()).is_none());
  }

  #[test]
  fn mine_soknader_lists_the_resumable_soknad() {
    let (person, soknad_id) = person_med_soknad();
    let mine = mine_soknader(&person, None);
    assert_eq!(mine.paabegynt.unwrap().soknad_id, soknad_id);
    assert!(mine.innsendte.is_empty());
  }
}
