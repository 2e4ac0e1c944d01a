//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. States are stored under
//! their wire names (with Norwegian characters). Structured fields
//! (dokumentkrav, dokumenter, kontekster) are stored as compact JSON. UUIDs
//! are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use soknad_core::{
  aktivitetslogg::Alvorlighetsgrad,
  dokumentkrav::Dokumentkrav,
  innsending::{Dokument, Innsending, InnsendingTilstand, InnsendingType},
  soknad::{Prosessversjon, Soknad, TilstandType},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── TilstandType ────────────────────────────────────────────────────────────

pub fn encode_tilstand(t: TilstandType) -> &'static str { t.navn() }

pub fn decode_tilstand(s: &str) -> Result<TilstandType> {
  match s {
    "UnderOpprettelse" => Ok(TilstandType::UnderOpprettelse),
    "Påbegynt" => Ok(TilstandType::Paabegynt),
    "AvventerArkiverbarSøknad" => Ok(TilstandType::AvventerArkiverbarSoknad),
    "AvventerMidlertidligJournalføring" => {
      Ok(TilstandType::AvventerMidlertidigJournalforing)
    }
    "AvventerJournalføring" => Ok(TilstandType::AvventerJournalforing),
    "Journalført" => Ok(TilstandType::Journalfort),
    "Slettet" => Ok(TilstandType::Slettet),
    other => Err(Error::UkjentVerdi(format!("søknad tilstand: {other:?}"))),
  }
}

// ─── InnsendingTilstand ──────────────────────────────────────────────────────

pub fn encode_innsending_tilstand(t: InnsendingTilstand) -> &'static str {
  t.navn()
}

pub fn decode_innsending_tilstand(s: &str) -> Result<InnsendingTilstand> {
  match s {
    "Opprettet" => Ok(InnsendingTilstand::Opprettet),
    "AvventerArkiverbarSøknad" => {
      Ok(InnsendingTilstand::AvventerArkiverbarSoknad)
    }
    "AvventerJournalføring" => Ok(InnsendingTilstand::AvventerJournalforing),
    "Journalført" => Ok(InnsendingTilstand::Journalfort),
    "Slettet" => Ok(InnsendingTilstand::Slettet),
    other => {
      Err(Error::UkjentVerdi(format!("innsending tilstand: {other:?}")))
    }
  }
}

// ─── Alvorlighetsgrad ────────────────────────────────────────────────────────

pub fn encode_alvorlighetsgrad(a: Alvorlighetsgrad) -> &'static str {
  match a {
    Alvorlighetsgrad::Info => "info",
    Alvorlighetsgrad::Varsel => "varsel",
    Alvorlighetsgrad::Feil => "feil",
    Alvorlighetsgrad::Alvorlig => "alvorlig",
  }
}

// ─── InnsendingType ──────────────────────────────────────────────────────────

pub fn encode_innsending_type(t: InnsendingType) -> &'static str {
  match t {
    InnsendingType::NyInnsending => "ny_innsending",
    InnsendingType::Ettersending => "ettersending",
  }
}

pub fn decode_innsending_type(s: &str) -> Result<InnsendingType> {
  match s {
    "ny_innsending" => Ok(InnsendingType::NyInnsending),
    "ettersending" => Ok(InnsendingType::Ettersending),
    other => Err(Error::UkjentVerdi(format!("innsending type: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `soknader` row. Also produced from a
/// domain [`Soknad`] on the write path, so both directions share one shape.
pub struct RawSoknad {
  pub soknad_id:             String,
  pub ident:                 String,
  pub tilstand:              String,
  pub spraak:                String,
  pub opprettet:             String,
  pub innsendt_tidspunkt:    Option<String>,
  pub sist_endret_av_bruker: String,
  pub prosessnavn:           Option<String>,
  pub prosessversjon:        Option<i32>,
  pub dokumentkrav:          String,
  pub behandlede_behov:      String,
  pub versjon:               i64,
}

impl RawSoknad {
  pub fn from_soknad(soknad: &Soknad) -> Result<Self> {
    let behov_strs: Vec<String> = soknad
      .behandlede_behov()
      .iter()
      .map(|id| encode_uuid(*id))
      .collect();

    Ok(Self {
      soknad_id:             encode_uuid(soknad.soknad_id()),
      ident:                 soknad.ident().to_string(),
      tilstand:              encode_tilstand(soknad.tilstand()).to_string(),
      spraak:                soknad.spraak().to_string(),
      opprettet:             encode_dt(soknad.opprettet()),
      innsendt_tidspunkt:    soknad.innsendt_tidspunkt().map(encode_dt),
      sist_endret_av_bruker: encode_dt(soknad.sist_endret_av_bruker()),
      prosessnavn:           soknad
        .prosessversjon()
        .map(|pv| pv.navn.clone()),
      prosessversjon:        soknad.prosessversjon().map(|pv| pv.versjon),
      dokumentkrav:          serde_json::to_string(soknad.dokumentkrav())?,
      behandlede_behov:      serde_json::to_string(&behov_strs)?,
      versjon:               soknad.versjon(),
    })
  }

  /// Rehydrate the søknad, attaching the primary innsending loaded
  /// separately from the `innsendinger` table.
  pub fn into_soknad(self, innsending: Option<Innsending>) -> Result<Soknad> {
    let soknad_id = decode_uuid(&self.soknad_id)?;
    let tilstand = decode_tilstand(&self.tilstand)?;
    let opprettet = decode_dt(&self.opprettet)?;
    let innsendt_tidspunkt = self
      .innsendt_tidspunkt
      .as_deref()
      .map(decode_dt)
      .transpose()?;
    let sist_endret_av_bruker = decode_dt(&self.sist_endret_av_bruker)?;

    let prosessversjon = match (self.prosessnavn, self.prosessversjon) {
      (Some(navn), Some(versjon)) => Some(Prosessversjon { navn, versjon }),
      _ => None,
    };

    let dokumentkrav: Dokumentkrav = serde_json::from_str(&self.dokumentkrav)?;

    let behov_strs: Vec<String> = serde_json::from_str(&self.behandlede_behov)?;
    let behandlede_behov = behov_strs
      .iter()
      .map(|s| decode_uuid(s))
      .collect::<Result<Vec<_>>>()?;

    Ok(Soknad::rehydrer(
      soknad_id,
      &self.ident,
      tilstand,
      self.spraak,
      opprettet,
      innsendt_tidspunkt,
      sist_endret_av_bruker,
      prosessversjon,
      dokumentkrav,
      innsending,
      behandlede_behov,
      self.versjon,
    ))
  }
}

/// Raw strings read directly from an `innsendinger` row.
pub struct RawInnsending {
  pub innsending_id:   String,
  pub soknad_id:       String,
  pub forelder_id:     Option<String>,
  pub ident:           String,
  pub innsending_type: String,
  pub tilstand:        String,
  pub innsendt:        String,
  pub journalpost_id:  Option<String>,
  pub skjemakode:      String,
  pub hoveddokument:   Option<String>,
  pub dokumenter:      String,
}

impl RawInnsending {
  /// Flatten one innsending into a row. Ettersendinger carry their parent's
  /// id in `forelder_id`; the primary carries `None`.
  pub fn from_innsending(
    innsending: &Innsending,
    soknad_id: Uuid,
    ident: &str,
    forelder_id: Option<Uuid>,
  ) -> Result<Self> {
    let hoveddokument = innsending
      .hoveddokument()
      .map(serde_json::to_string)
      .transpose()?;

    Ok(Self {
      innsending_id:   encode_uuid(innsending.innsending_id()),
      soknad_id:       encode_uuid(soknad_id),
      forelder_id:     forelder_id.map(encode_uuid),
      ident:           ident.to_string(),
      innsending_type: encode_innsending_type(innsending.innsending_type())
        .to_string(),
      tilstand:        encode_innsending_tilstand(innsending.tilstand())
        .to_string(),
      innsendt:        encode_dt(innsending.innsendt()),
      journalpost_id:  innsending.journalpost_id().map(str::to_string),
      skjemakode:      innsending.skjemakode().to_string(),
      hoveddokument,
      dokumenter:      serde_json::to_string(innsending.dokumenter())?,
    })
  }

  pub fn into_innsending(
    self,
    ettersendinger: Vec<Innsending>,
  ) -> Result<Innsending> {
    let hoveddokument: Option<Dokument> = self
      .hoveddokument
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;
    let dokumenter: Vec<Dokument> = serde_json::from_str(&self.dokumenter)?;

    Ok(Innsending::rehydrer(
      decode_uuid(&self.innsending_id)?,
      decode_uuid(&self.soknad_id)?,
      &self.ident,
      decode_innsending_type(&self.innsending_type)?,
      decode_innsending_tilstand(&self.tilstand)?,
      decode_dt(&self.innsendt)?,
      self.journalpost_id,
      self.skjemakode,
      hoveddokument,
      dokumenter,
      ettersendinger,
    ))
  }
}
