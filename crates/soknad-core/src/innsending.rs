//! Innsending — one journaled filing of documents.
//!
//! An innsending is created when the søknad is submitted (or when the user
//! files an ettersending on a journalført søknad) and is driven to its
//! terminal state by two asynchronous request/response round trips on the
//! rapid: first the archivable document set is produced, then a journalpost
//! is created and completed downstream. Solutions arriving late, twice, or
//! for the wrong innsending are no-ops.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  aktivitetslogg::{Aktivitetskontekst, Aktivitetslogg, BehovType, Kontekst},
  dokumentkrav::Dokumentkrav,
  observer::PersonEvent,
};

// ─── Documents ───────────────────────────────────────────────────────────────

/// One stored rendition of a document (e.g. the archival PDF and the net
/// version), addressed by URN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dokumentvariant {
  pub variant_id: Uuid,
  pub filnavn:    String,
  pub urn:        String,
  /// Rendition kind, e.g. "ARKIV" or "FULLVERSJON".
  pub variant:    String,
  pub mime_type:  String,
}

/// A document belonging to an innsending: the main søknad document or an
/// attachment backing a dokumentkrav.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dokument {
  pub dokument_id: Uuid,
  /// The dokumentkrav this document answers, if any.
  pub krav_id:     Option<String>,
  /// NAV form code, e.g. "NAV 04-01.02".
  pub skjemakode:  Option<String>,
  pub varianter:   Vec<Dokumentvariant>,
}

// ─── States ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InnsendingTilstand {
  Opprettet,
  AvventerArkiverbarSoknad,
  AvventerJournalforing,
  Journalfort,
  Slettet,
}

impl InnsendingTilstand {
  /// Wire/storage name for the state.
  pub fn navn(self) -> &'static str {
    match self {
      InnsendingTilstand::Opprettet => "Opprettet",
      InnsendingTilstand::AvventerArkiverbarSoknad => {
        "AvventerArkiverbarSøknad"
      }
      InnsendingTilstand::AvventerJournalforing => "AvventerJournalføring",
      InnsendingTilstand::Journalfort => "Journalført",
      InnsendingTilstand::Slettet => "Slettet",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InnsendingType {
  NyInnsending,
  Ettersending,
}

/// Which innsending a løsning landed on, if any. `Ingen` covers both
/// "no match" and "matched but already past that state" — in either case
/// the søknad must not mirror anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Treff {
  Ingen,
  Primaer,
  Ettersending,
}

// ─── Innsending ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Innsending {
  innsending_id:   Uuid,
  soknad_id:       Uuid,
  ident:           String,
  innsending_type: InnsendingType,
  tilstand:        InnsendingTilstand,
  innsendt:        DateTime<Utc>,
  journalpost_id:  Option<String>,
  skjemakode:      String,
  hoveddokument:   Option<Dokument>,
  dokumenter:      Vec<Dokument>,
  ettersendinger:  Vec<Innsending>,
}

impl Aktivitetskontekst for Innsending {
  fn kontekst(&self) -> Kontekst {
    Kontekst::ny("Innsending")
      .med("innsendingId", self.innsending_id)
      .med("type", format!("{:?}", self.innsending_type))
  }
}

impl Innsending {
  pub(crate) fn ny(
    soknad_id: Uuid,
    ident: &str,
    innsending_type: InnsendingType,
    innsendt: DateTime<Utc>,
    skjemakode: &str,
  ) -> Self {
    Self {
      innsending_id: Uuid::new_v4(),
      soknad_id,
      ident: ident.to_string(),
      innsending_type,
      tilstand: InnsendingTilstand::Opprettet,
      innsendt,
      journalpost_id: None,
      skjemakode: skjemakode.to_string(),
      hoveddokument: None,
      dokumenter: Vec::new(),
      ettersendinger: Vec::new(),
    }
  }

  pub fn innsending_id(&self) -> Uuid {
    self.innsending_id
  }

  pub fn tilstand(&self) -> InnsendingTilstand {
    self.tilstand
  }

  pub fn innsending_type(&self) -> InnsendingType {
    self.innsending_type
  }

  pub fn journalpost_id(&self) -> Option<&str> {
    self.journalpost_id.as_deref()
  }

  pub fn ettersendinger(&self) -> &[Innsending] {
    &self.ettersendinger
  }

  /// Whether this innsending or any of its ettersendinger carries the given
  /// journalpost. Used for the secondary routing index.
  pub fn har_journalpost(&self, journalpost_id: &str) -> bool {
    self.journalpost_id.as_deref() == Some(journalpost_id)
      || self
        .ettersendinger
        .iter()
        .any(|e| e.har_journalpost(journalpost_id))
  }

  // ── Transitions ───────────────────────────────────────────────────────

  /// Drive a freshly created innsending out of `Opprettet`: request the
  /// archivable document set for it.
  pub(crate) fn start(
    &mut self,
    dokumentkrav: &Dokumentkrav,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) {
    logg.kontekst(self);
    self.dokumenter = dokumentkrav
      .leveres_naa()
      .map(|krav| Dokument {
        dokument_id: Uuid::new_v4(),
        krav_id:     Some(krav.krav_id.clone()),
        skjemakode:  None,
        varianter:   Vec::new(),
      })
      .collect();
    self.endre_tilstand(InnsendingTilstand::AvventerArkiverbarSoknad, logg, ut);
    self.behov_arkiverbar(logg);
  }

  /// The archivable document set arrived. Records the main document,
  /// requests a journalpost for it, and advances to awaiting journalføring.
  pub(crate) fn handter_arkiverbar(
    &mut self,
    innsending_id: Uuid,
    hoveddokument: &Dokument,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Treff {
    if self.innsending_id != innsending_id {
      return self.deleger_til_ettersending(innsending_id, |e, logg, ut| {
        e.handter_arkiverbar(innsending_id, hoveddokument, logg, ut)
      }, logg, ut);
    }
    logg.kontekst(self);
    if self.tilstand != InnsendingTilstand::AvventerArkiverbarSoknad {
      logg.info(format!(
        "Ignoring arkiverbar søknad in state {}; already handled",
        self.tilstand.navn()
      ));
      return Treff::Ingen;
    }
    self.hoveddokument = Some(hoveddokument.clone());
    self.endre_tilstand(InnsendingTilstand::AvventerJournalforing, logg, ut);
    self.behov_ny_journalpost(logg);
    self.treff()
  }

  /// A provisional journalpost id arrived. Recorded as an attribute — the
  /// state advances only on the final journalføring confirmation.
  pub(crate) fn handter_midlertidig_journalfort(
    &mut self,
    innsending_id: Uuid,
    journalpost_id: &str,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Treff {
    if self.innsending_id != innsending_id {
      return self.deleger_til_ettersending(innsending_id, |e, logg, ut| {
        e.handter_midlertidig_journalfort(innsending_id, journalpost_id, logg, ut)
      }, logg, ut);
    }
    logg.kontekst(self);
    if self.tilstand != InnsendingTilstand::AvventerJournalforing
      || self.journalpost_id.is_some()
    {
      logg.info(format!(
        "Ignoring midlertidig journalføring in state {}; already handled",
        self.tilstand.navn()
      ));
      return Treff::Ingen;
    }
    self.journalpost_id = Some(journalpost_id.to_string());
    logg.info(format!("Mottok journalpost {journalpost_id}"));
    self.treff()
  }

  /// The downstream journalføring completed for the given journalpost.
  pub(crate) fn handter_journalfort(
    &mut self,
    journalpost_id: &str,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Treff {
    if self.journalpost_id.as_deref() != Some(journalpost_id) {
      let eier = self
        .ettersendinger
        .iter()
        .position(|e| e.har_journalpost(journalpost_id));
      return match eier {
        Some(i) => {
          match self.ettersendinger[i]
            .handter_journalfort(journalpost_id, logg, ut)
          {
            Treff::Ingen => Treff::Ingen,
            _ => Treff::Ettersending,
          }
        }
        None => {
          logg.info(format!(
            "No innsending matched journalpost {journalpost_id}; \
             ignoring løsning"
          ));
          Treff::Ingen
        }
      };
    }
    logg.kontekst(self);
    if self.tilstand != InnsendingTilstand::AvventerJournalforing {
      logg.info(format!(
        "Ignoring journalføring of {journalpost_id} in state {}; already handled",
        self.tilstand.navn()
      ));
      return Treff::Ingen;
    }
    self.endre_tilstand(InnsendingTilstand::Journalfort, logg, ut);
    self.treff()
  }

  /// Create and start an ettersending. The caller has already verified that
  /// this innsending is journalført.
  pub(crate) fn ettersend(
    &mut self,
    innsendt: DateTime<Utc>,
    dokumentkrav: &Dokumentkrav,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Uuid {
    let mut ettersending = Innsending::ny(
      self.soknad_id,
      &self.ident,
      InnsendingType::Ettersending,
      innsendt,
      &self.skjemakode,
    );
    let id = ettersending.innsending_id;
    ettersending.start(dokumentkrav, logg, ut);
    self.ettersendinger.push(ettersending);
    id
  }

  /// Abandon an in-flight innsending. Journalført innsendinger are
  /// immutable and are left untouched.
  pub(crate) fn slett(
    &mut self,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) {
    if matches!(
      self.tilstand,
      InnsendingTilstand::Journalfort | InnsendingTilstand::Slettet
    ) {
      return;
    }
    logg.kontekst(self);
    self.endre_tilstand(InnsendingTilstand::Slettet, logg, ut);
  }

  // ── Internals ─────────────────────────────────────────────────────────

  fn treff(&self) -> Treff {
    match self.innsending_type {
      InnsendingType::NyInnsending => Treff::Primaer,
      InnsendingType::Ettersending => Treff::Ettersending,
    }
  }

  fn deleger_til_ettersending(
    &mut self,
    innsending_id: Uuid,
    handler: impl Fn(
      &mut Innsending,
      &mut Aktivitetslogg,
      &mut Vec<PersonEvent>,
    ) -> Treff,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Treff {
    for ettersending in &mut self.ettersendinger {
      match handler(ettersending, logg, ut) {
        Treff::Ingen => continue,
        _ => return Treff::Ettersending,
      }
    }
    logg.info(format!(
      "No innsending matched id {innsending_id}; ignoring løsning"
    ));
    Treff::Ingen
  }

  fn endre_tilstand(
    &mut self,
    ny: InnsendingTilstand,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) {
    let forrige = self.tilstand;
    self.tilstand = ny;
    logg.info(format!(
      "Innsending endret tilstand fra {} til {}",
      forrige.navn(),
      ny.navn()
    ));
    ut.push(PersonEvent::InnsendingEndretTilstand {
      soknad_id:       self.soknad_id,
      innsending_id:   self.innsending_id,
      innsending_type: self.innsending_type,
      forrige,
      gjeldende:       ny,
    });
  }

  fn korrelasjon(&self) -> BTreeMap<String, serde_json::Value> {
    let mut detaljer = BTreeMap::new();
    detaljer.insert(
      "søknad_uuid".to_string(),
      serde_json::json!(self.soknad_id),
    );
    detaljer.insert(
      "innsendingId".to_string(),
      serde_json::json!(self.innsending_id),
    );
    detaljer.insert("ident".to_string(), serde_json::json!(self.ident));
    detaljer
      .insert("skjemakode".to_string(), serde_json::json!(self.skjemakode));
    detaljer
  }

  fn behov_arkiverbar(&self, logg: &mut Aktivitetslogg) {
    let mut detaljer = self.korrelasjon();
    detaljer.insert(
      "dokumentasjonKravId".to_string(),
      serde_json::json!(
        self
          .dokumenter
          .iter()
          .filter_map(|d| d.krav_id.as_deref())
          .collect::<Vec<_>>()
      ),
    );
    logg.behov(
      BehovType::ArkiverbarSoknad,
      "Trenger arkiverbart dokument for innsendingen",
      detaljer,
    );
  }

  fn behov_ny_journalpost(&self, logg: &mut Aktivitetslogg) {
    let mut detaljer = self.korrelasjon();
    detaljer.insert(
      "hovedDokument".to_string(),
      serde_json::json!(self.hoveddokument),
    );
    detaljer
      .insert("dokumenter".to_string(), serde_json::json!(self.dokumenter));
    logg.behov(
      BehovType::NyJournalpost,
      "Trenger journalpost for innsendingen",
      detaljer,
    );
  }

  // ── Rehydration ───────────────────────────────────────────────────────

  /// Rebuild a persisted innsending without running any transition logic.
  #[allow(clippy::too_many_arguments)]
  pub fn rehydrer(
    innsending_id: Uuid,
    soknad_id: Uuid,
    ident: &str,
    innsending_type: InnsendingType,
    tilstand: InnsendingTilstand,
    innsendt: DateTime<Utc>,
    journalpost_id: Option<String>,
    skjemakode: String,
    hoveddokument: Option<Dokument>,
    dokumenter: Vec<Dokument>,
    ettersendinger: Vec<Innsending>,
  ) -> Self {
    Self {
      innsending_id,
      soknad_id,
      ident: ident.to_string(),
      innsending_type,
      tilstand,
      innsendt,
      journalpost_id,
      skjemakode,
      hoveddokument,
      dokumenter,
      ettersendinger,
    }
  }

  pub fn innsendt(&self) -> DateTime<Utc> {
    self.innsendt
  }

  pub fn skjemakode(&self) -> &str {
    &self.skjemakode
  }

  pub fn hoveddokument(&self) -> Option<&Dokument> {
    self.hoveddokument.as_ref()
  }

  pub fn dokumenter(&self) -> &[Dokument] {
    &self.dokumenter
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::aktivitetslogg::Alvorlighetsgrad;

  fn dokument() -> Dokument {
    Dokument {
      dokument_id: Uuid::new_v4(),
      krav_id:     None,
      skjemakode:  Some("NAV 04-01.02".to_string()),
      varianter:   vec![Dokumentvariant {
        variant_id: Uuid::new_v4(),
        filnavn:    "soknad.pdf".to_string(),
        urn:        "urn:dokument:1".to_string(),
        variant:    "ARKIV".to_string(),
        mime_type:  "application/pdf".to_string(),
      }],
    }
  }

  fn startet_innsending() -> (Innsending, Vec<PersonEvent>, Aktivitetslogg) {
    let mut logg = Aktivitetslogg::ny();
    let mut ut = Vec::new();
    let mut innsending = Innsending::ny(
      Uuid::new_v4(),
      "12345678912",
      InnsendingType::NyInnsending,
      Utc::now(),
      "NAV 04-01.02",
    );
    innsending.start(&Dokumentkrav::ny(), &mut logg, &mut ut);
    (innsending, ut, logg)
  }

  #[test]
  fn start_raises_arkiverbar_behov() {
    let (innsending, ut, logg) = startet_innsending();
    assert_eq!(
      innsending.tilstand(),
      InnsendingTilstand::AvventerArkiverbarSoknad
    );
    assert_eq!(logg.behovene().len(), 1);
    assert_eq!(logg.behovene()[0].typ, BehovType::ArkiverbarSoknad);
    assert_eq!(ut.len(), 1);
  }

  #[test]
  fn full_journalforing_round_trip() {
    let (mut innsending, mut ut, mut logg) = startet_innsending();
    let id = innsending.innsending_id();

    let treff =
      innsending.handter_arkiverbar(id, &dokument(), &mut logg, &mut ut);
    assert_eq!(treff, Treff::Primaer);
    assert_eq!(
      innsending.tilstand(),
      InnsendingTilstand::AvventerJournalforing
    );
    assert_eq!(logg.behovene()[1].typ, BehovType::NyJournalpost);

    let treff = innsending
      .handter_midlertidig_journalfort(id, "J123", &mut logg, &mut ut);
    assert_eq!(treff, Treff::Primaer);
    assert_eq!(innsending.journalpost_id(), Some("J123"));

    let treff = innsending.handter_journalfort("J123", &mut logg, &mut ut);
    assert_eq!(treff, Treff::Primaer);
    assert_eq!(innsending.tilstand(), InnsendingTilstand::Journalfort);
  }

  #[test]
  fn duplicate_solutions_are_noops() {
    let (mut innsending, mut ut, mut logg) = startet_innsending();
    let id = innsending.innsending_id();
    innsending.handter_arkiverbar(id, &dokument(), &mut logg, &mut ut);
    innsending.handter_midlertidig_journalfort(id, "J123", &mut logg, &mut ut);
    innsending.handter_journalfort("J123", &mut logg, &mut ut);

    let behov_for = logg.behovene().len();
    let ut_for = ut.len();

    // Replays of every solution must change nothing and raise nothing.
    assert_eq!(
      innsending.handter_arkiverbar(id, &dokument(), &mut logg, &mut ut),
      Treff::Ingen
    );
    assert_eq!(
      innsending
        .handter_midlertidig_journalfort(id, "J999", &mut logg, &mut ut),
      Treff::Ingen
    );
    assert_eq!(
      innsending.handter_journalfort("J123", &mut logg, &mut ut),
      Treff::Ingen
    );
    assert_eq!(innsending.tilstand(), InnsendingTilstand::Journalfort);
    assert_eq!(innsending.journalpost_id(), Some("J123"));
    assert_eq!(logg.behovene().len(), behov_for);
    assert_eq!(ut.len(), ut_for);
  }

  #[test]
  fn solution_for_unknown_innsending_is_ignored() {
    let (mut innsending, mut ut, mut logg) = startet_innsending();
    let treff = innsending.handter_arkiverbar(
      Uuid::new_v4(),
      &dokument(),
      &mut logg,
      &mut ut,
    );
    assert_eq!(treff, Treff::Ingen);
    assert_eq!(
      innsending.tilstand(),
      InnsendingTilstand::AvventerArkiverbarSoknad
    );

    // The no-op must leave an info trace behind.
    let siste = logg.aktiviteter().last().unwrap();
    assert_eq!(siste.alvorlighetsgrad, Alvorlighetsgrad::Info);
    assert!(siste.melding.contains("No innsending matched"));
  }

  #[test]
  fn journalforing_for_unknown_journalpost_is_ignored_with_info() {
    let (mut innsending, mut ut, mut logg) = startet_innsending();
    let id = innsending.innsending_id();
    innsending.handter_arkiverbar(id, &dokument(), &mut logg, &mut ut);
    innsending.handter_midlertidig_journalfort(id, "J123", &mut logg, &mut ut);

    let treff = innsending.handter_journalfort("J999", &mut logg, &mut ut);
    assert_eq!(treff, Treff::Ingen);
    assert_eq!(
      innsending.tilstand(),
      InnsendingTilstand::AvventerJournalforing
    );
    assert!(
      logg
        .aktiviteter()
        .last()
        .unwrap()
        .melding
        .contains("No innsending matched journalpost J999")
    );
  }

  #[test]
  fn ettersending_routes_solutions_recursively() {
    let (mut innsending, mut ut, mut logg) = startet_innsending();
    let id = innsending.innsending_id();
    innsending.handter_arkiverbar(id, &dokument(), &mut logg, &mut ut);
    innsending.handter_midlertidig_journalfort(id, "J123", &mut logg, &mut ut);
    innsending.handter_journalfort("J123", &mut logg, &mut ut);

    let ettersending_id = innsending.ettersend(
      Utc::now(),
      &Dokumentkrav::ny(),
      &mut logg,
      &mut ut,
    );
    assert_eq!(innsending.ettersendinger().len(), 1);

    let treff = innsending.handter_arkiverbar(
      ettersending_id,
      &dokument(),
      &mut logg,
      &mut ut,
    );
    assert_eq!(treff, Treff::Ettersending);
    let treff = innsending.handter_midlertidig_journalfort(
      ettersending_id,
      "J456",
      &mut logg,
      &mut ut,
    );
    assert_eq!(treff, Treff::Ettersending);
    let treff = innsending.handter_journalfort("J456", &mut logg, &mut ut);
    assert_eq!(treff, Treff::Ettersending);
    assert_eq!(
      innsending.ettersendinger()[0].tilstand(),
      InnsendingTilstand::Journalfort
    );
    // The primary is untouched.
    assert_eq!(innsending.tilstand(), InnsendingTilstand::Journalfort);
  }

  #[test]
  fn slett_is_refused_silently_after_journalforing() {
    let (mut innsending, mut ut, mut logg) = startet_innsending();
    let id = innsending.innsending_id();
    innsending.handter_arkiverbar(id, &dokument(), &mut logg, &mut ut);
    innsending.handter_midlertidig_journalfort(id, "J123", &mut logg, &mut ut);
    innsending.handter_journalfort("J123", &mut logg, &mut ut);

    innsending.slett(&mut logg, &mut ut);
    assert_eq!(innsending.tilstand(), InnsendingTilstand::Journalfort);
  }
}
