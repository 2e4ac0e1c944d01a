//! Soknad — the application lifecycle state machine.
//!
//! A søknad is created on the user's wish, filled in while `Paabegynt`,
//! frozen on submission, and then mirrors its primary [`Innsending`] through
//! the journalføring milestones. All transitions are monotonic; the only
//! side exit is an explicit delete while still unsubmitted. Løsninger are
//! deduplicated on their behov id to tolerate at-least-once delivery.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  aktivitetslogg::{Aktivitetskontekst, Aktivitetslogg, BehovType, Kontekst},
  dokumentkrav::{Dokumentkrav, Krav, Svar},
  error::{Error, Result},
  innsending::{Dokument, Innsending, InnsendingType, Treff},
  observer::PersonEvent,
};

/// NAV form code for the dagpenger søknad main document.
const SKJEMAKODE: &str = "NAV 04-01.02";

// ─── States ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TilstandType {
  UnderOpprettelse,
  Paabegynt,
  AvventerArkiverbarSoknad,
  AvventerMidlertidigJournalforing,
  AvventerJournalforing,
  Journalfort,
  Slettet,
}

impl TilstandType {
  /// Wire/storage name for the state.
  pub fn navn(self) -> &'static str {
    match self {
      TilstandType::UnderOpprettelse => "UnderOpprettelse",
      TilstandType::Paabegynt => "Påbegynt",
      TilstandType::AvventerArkiverbarSoknad => "AvventerArkiverbarSøknad",
      TilstandType::AvventerMidlertidigJournalforing => {
        "AvventerMidlertidligJournalføring"
      }
      TilstandType::AvventerJournalforing => "AvventerJournalføring",
      TilstandType::Journalfort => "Journalført",
      TilstandType::Slettet => "Slettet",
    }
  }

  /// Whether the søknad still counts towards the one-in-progress rule.
  pub fn er_aktiv(self) -> bool {
    matches!(
      self,
      TilstandType::UnderOpprettelse | TilstandType::Paabegynt
    )
  }
}

/// The form-engine process backing a søknad. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prosessversjon {
  pub navn:    String,
  pub versjon: i32,
}

// ─── Soknad ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Soknad {
  soknad_id:             Uuid,
  ident:                 String,
  tilstand:              TilstandType,
  spraak:                String,
  opprettet:             DateTime<Utc>,
  innsendt_tidspunkt:    Option<DateTime<Utc>>,
  sist_endret_av_bruker: DateTime<Utc>,
  prosessversjon:        Option<Prosessversjon>,
  dokumentkrav:          Dokumentkrav,
  innsending:            Option<Innsending>,
  /// Behov ids already answered; replays of these are skipped.
  behandlede_behov:      Vec<Uuid>,
  /// Optimistic-concurrency counter, maintained by the store.
  versjon:               i64,
}

impl Aktivitetskontekst for Soknad {
  fn kontekst(&self) -> Kontekst {
    Kontekst::ny("Soknad")
      .med("søknad_uuid", self.soknad_id)
      .med("tilstand", self.tilstand.navn())
  }
}

impl Soknad {
  pub(crate) fn ny(soknad_id: Uuid, ident: &str, spraak: &str) -> Self {
    let opprettet = Utc::now();
    Self {
      soknad_id,
      ident: ident.to_string(),
      tilstand: TilstandType::UnderOpprettelse,
      spraak: spraak.to_string(),
      opprettet,
      innsendt_tidspunkt: None,
      sist_endret_av_bruker: opprettet,
      prosessversjon: None,
      dokumentkrav: Dokumentkrav::ny(),
      innsending: None,
      behandlede_behov: Vec::new(),
      versjon: 0,
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub fn soknad_id(&self) -> Uuid {
    self.soknad_id
  }

  pub fn ident(&self) -> &str {
    &self.ident
  }

  pub fn tilstand(&self) -> TilstandType {
    self.tilstand
  }

  pub fn spraak(&self) -> &str {
    &self.spraak
  }

  pub fn opprettet(&self) -> DateTime<Utc> {
    self.opprettet
  }

  pub fn innsendt_tidspunkt(&self) -> Option<DateTime<Utc>> {
    self.innsendt_tidspunkt
  }

  pub fn sist_endret_av_bruker(&self) -> DateTime<Utc> {
    self.sist_endret_av_bruker
  }

  pub fn prosessversjon(&self) -> Option<&Prosessversjon> {
    self.prosessversjon.as_ref()
  }

  pub fn dokumentkrav(&self) -> &Dokumentkrav {
    &self.dokumentkrav
  }

  pub fn innsending(&self) -> Option<&Innsending> {
    self.innsending.as_ref()
  }

  pub fn behandlede_behov(&self) -> &[Uuid] {
    &self.behandlede_behov
  }

  pub fn versjon(&self) -> i64 {
    self.versjon
  }

  pub fn eier_journalpost(&self, journalpost_id: &str) -> bool {
    self
      .innsending
      .as_ref()
      .is_some_and(|i| i.har_journalpost(journalpost_id))
  }

  // ── Event handlers ────────────────────────────────────────────────────

  /// First step of the lifecycle: ask the form engine to create a process
  /// for this søknad.
  pub(crate) fn handter_onske(
    &mut self,
    prosessnavn: &str,
    logg: &mut Aktivitetslogg,
  ) {
    logg.kontekst(self);
    let mut detaljer = BTreeMap::new();
    detaljer
      .insert("søknad_uuid".to_string(), serde_json::json!(self.soknad_id));
    detaljer.insert("ident".to_string(), serde_json::json!(self.ident));
    detaljer
      .insert("prosessnavn".to_string(), serde_json::json!(prosessnavn));
    detaljer.insert("språk".to_string(), serde_json::json!(self.spraak));
    logg.behov(
      BehovType::NySoknad,
      "Trenger ny søknadsprosess fra quiz-motoren",
      detaljer,
    );
  }

  /// The form engine confirmed the process. Requires a resolvable
  /// prosessversjon; without one the søknad cannot be filled in.
  pub(crate) fn handter_opprettet(
    &mut self,
    behov_id: Uuid,
    prosessversjon: Option<Prosessversjon>,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Result<()> {
    logg.kontekst(self);
    if self.er_duplikat(behov_id, logg) {
      return Ok(());
    }
    if self.tilstand != TilstandType::UnderOpprettelse {
      logg.info(format!(
        "Ignoring søknad opprettet in state {}; already handled",
        self.tilstand.navn()
      ));
      return Ok(());
    }
    let Some(prosessversjon) = prosessversjon else {
      return Err(
        logg.alvorlig(Error::ManglerProsessversjon(self.soknad_id)),
      );
    };
    self.prosessversjon = Some(prosessversjon);
    self.endre_tilstand(TilstandType::Paabegynt, logg, ut);
    Ok(())
  }

  /// User edits are only possible while `Paabegynt`; afterwards the søknad
  /// is frozen.
  pub(crate) fn handter_faktum_oppdatert(
    &mut self,
    tidspunkt: DateTime<Utc>,
    logg: &mut Aktivitetslogg,
  ) -> Result<()> {
    logg.kontekst(self);
    self.krev_redigerbar(logg)?;
    self.registrer_brukerendring(tidspunkt);
    logg.info("Faktum oppdatert av bruker");
    Ok(())
  }

  pub(crate) fn handter_dokumentkrav_sammenstilling(
    &mut self,
    krav: Vec<Krav>,
    logg: &mut Aktivitetslogg,
  ) -> Result<()> {
    logg.kontekst(self);
    self.krev_redigerbar(logg)?;
    logg.info(format!("Sammenstilte {} dokumentkrav", krav.len()));
    self.dokumentkrav.sammenstill(krav);
    Ok(())
  }

  pub(crate) fn handter_dokumentkrav_svar(
    &mut self,
    krav_id: &str,
    svar: Svar,
    logg: &mut Aktivitetslogg,
  ) -> Result<()> {
    logg.kontekst(self);
    self.krev_redigerbar(logg)?;
    if self.dokumentkrav.besvar(krav_id, svar) {
      self.registrer_brukerendring(Utc::now());
      logg.info(format!("Besvarte dokumentkrav {krav_id}"));
    } else {
      logg.varsel(format!("Svar på ukjent dokumentkrav {krav_id} forkastet"));
    }
    Ok(())
  }

  /// The user submitted the søknad: freeze it, create the primary
  /// innsending and start the archiving round trip.
  pub(crate) fn handter_innsendt(
    &mut self,
    innsendt_tidspunkt: DateTime<Utc>,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Result<()> {
    logg.kontekst(self);
    if self.tilstand != TilstandType::Paabegynt {
      return Err(logg.alvorlig(Error::UgyldigTilstand {
        hendelse: "SoknadInnsendtHendelse".to_string(),
        tilstand: self.tilstand.navn().to_string(),
      }));
    }
    if !self.dokumentkrav.er_komplett() {
      return Err(
        logg.alvorlig(Error::DokumentkravIkkeKomplett(self.soknad_id)),
      );
    }
    // The first submission time is retained even if journalføring is
    // re-driven later.
    if self.innsendt_tidspunkt.is_none() {
      self.innsendt_tidspunkt = Some(innsendt_tidspunkt);
    }
    let mut innsending = Innsending::ny(
      self.soknad_id,
      &self.ident,
      InnsendingType::NyInnsending,
      innsendt_tidspunkt,
      SKJEMAKODE,
    );
    self.endre_tilstand(TilstandType::AvventerArkiverbarSoknad, logg, ut);
    ut.push(PersonEvent::SoknadInnsendt {
      soknad_id: self.soknad_id,
      innsendt_tidspunkt,
    });
    innsending.start(&self.dokumentkrav, logg, ut);
    self.innsending = Some(innsending);
    Ok(())
  }

  pub(crate) fn handter_arkiverbar(
    &mut self,
    innsending_id: Uuid,
    behov_id: Uuid,
    hoveddokument: &Dokument,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Result<()> {
    logg.kontekst(self);
    if self.er_duplikat(behov_id, logg) {
      return Ok(());
    }
    let Some(innsending) = self.innsending.as_mut() else {
      logg.info("Ignoring arkiverbar søknad; no innsending exists");
      return Ok(());
    };
    let treff =
      innsending.handter_arkiverbar(innsending_id, hoveddokument, logg, ut);
    if treff == Treff::Primaer
      && self.tilstand == TilstandType::AvventerArkiverbarSoknad
    {
      self.endre_tilstand(
        TilstandType::AvventerMidlertidigJournalforing,
        logg,
        ut,
      );
    }
    Ok(())
  }

  pub(crate) fn handter_midlertidig_journalfort(
    &mut self,
    innsending_id: Uuid,
    behov_id: Uuid,
    journalpost_id: &str,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Result<()> {
    logg.kontekst(self);
    if self.er_duplikat(behov_id, logg) {
      return Ok(());
    }
    let Some(innsending) = self.innsending.as_mut() else {
      logg.info("Ignoring midlertidig journalføring; no innsending exists");
      return Ok(());
    };
    let treff = innsending.handter_midlertidig_journalfort(
      innsending_id,
      journalpost_id,
      logg,
      ut,
    );
    if treff == Treff::Primaer
      && self.tilstand == TilstandType::AvventerMidlertidigJournalforing
    {
      self.endre_tilstand(TilstandType::AvventerJournalforing, logg, ut);
    }
    Ok(())
  }

  pub(crate) fn handter_journalfort(
    &mut self,
    journalpost_id: &str,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Result<()> {
    logg.kontekst(self);
    let Some(innsending) = self.innsending.as_mut() else {
      logg.info("Ignoring journalføring; no innsending exists");
      return Ok(());
    };
    let treff = innsending.handter_journalfort(journalpost_id, logg, ut);
    if treff == Treff::Primaer
      && self.tilstand == TilstandType::AvventerJournalforing
    {
      self.endre_tilstand(TilstandType::Journalfort, logg, ut);
    }
    Ok(())
  }

  /// Explicit user delete. Only possible before submission; the søknad is
  /// marked deleted rather than purged so its history survives.
  pub(crate) fn handter_slett(
    &mut self,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Result<()> {
    logg.kontekst(self);
    if !self.tilstand.er_aktiv() {
      return Err(logg.alvorlig(Error::KanIkkeSlettes(self.soknad_id)));
    }
    if let Some(innsending) = self.innsending.as_mut() {
      innsending.slett(logg, ut);
    }
    self.endre_tilstand(TilstandType::Slettet, logg, ut);
    ut.push(PersonEvent::SoknadSlettet {
      soknad_id: self.soknad_id,
    });
    Ok(())
  }

  /// File an ettersending on the journalført primary innsending.
  pub(crate) fn handter_ettersending(
    &mut self,
    innsendt_tidspunkt: DateTime<Utc>,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) -> Result<Uuid> {
    logg.kontekst(self);
    let innsending = match self.innsending.as_mut() {
      Some(innsending) if self.tilstand == TilstandType::Journalfort => {
        innsending
      }
      _ => {
        return Err(logg.alvorlig(Error::EttersendingUtenJournalforing(
          self.soknad_id,
        )));
      }
    };
    let id = innsending.ettersend(
      innsendt_tidspunkt,
      &self.dokumentkrav,
      logg,
      ut,
    );
    Ok(id)
  }

  // ── Internals ─────────────────────────────────────────────────────────

  fn endre_tilstand(
    &mut self,
    ny: TilstandType,
    logg: &mut Aktivitetslogg,
    ut: &mut Vec<PersonEvent>,
  ) {
    let forrige = self.tilstand;
    self.tilstand = ny;
    logg.info(format!(
      "Søknad endret tilstand fra {} til {}",
      forrige.navn(),
      ny.navn()
    ));
    ut.push(PersonEvent::SoknadEndretTilstand {
      soknad_id: self.soknad_id,
      forrige,
      gjeldende: ny,
    });
  }

  fn krev_redigerbar(&self, logg: &mut Aktivitetslogg) -> Result<()> {
    match self.tilstand {
      TilstandType::Paabegynt => Ok(()),
      TilstandType::UnderOpprettelse | TilstandType::Slettet => {
        Err(logg.alvorlig(Error::UgyldigTilstand {
          hendelse: "brukerendring".to_string(),
          tilstand: self.tilstand.navn().to_string(),
        }))
      }
      // Submitted in any form: frozen.
      _ => Err(logg.alvorlig(Error::SoknadLaast(self.soknad_id))),
    }
  }

  /// `sist_endret_av_bruker` only ever advances.
  fn registrer_brukerendring(&mut self, tidspunkt: DateTime<Utc>) {
    self.sist_endret_av_bruker = self.sist_endret_av_bruker.max(tidspunkt);
  }

  fn er_duplikat(&mut self, behov_id: Uuid, logg: &mut Aktivitetslogg) -> bool {
    if self.behandlede_behov.contains(&behov_id) {
      logg.info(format!("Behov {behov_id} already processed; skipping"));
      return true;
    }
    self.behandlede_behov.push(behov_id);
    false
  }

  // ── Rehydration ───────────────────────────────────────────────────────

  /// Rebuild a persisted søknad without running any transition logic.
  #[allow(clippy::too_many_arguments)]
  pub fn rehydrer(
    soknad_id: Uuid,
    ident: &str,
    tilstand: TilstandType,
    spraak: String,
    opprettet: DateTime<Utc>,
    innsendt_tidspunkt: Option<DateTime<Utc>>,
    sist_endret_av_bruker: DateTime<Utc>,
    prosessversjon: Option<Prosessversjon>,
    dokumentkrav: Dokumentkrav,
    innsending: Option<Innsending>,
    behandlede_behov: Vec<Uuid>,
    versjon: i64,
  ) -> Self {
    Self {
      soknad_id,
      ident: ident.to_string(),
      tilstand,
      spraak,
      opprettet,
      innsendt_tidspunkt,
      sist_endret_av_bruker,
      prosessversjon,
      dokumentkrav,
      innsending,
      behandlede_behov,
      versjon,
    }
  }
}
