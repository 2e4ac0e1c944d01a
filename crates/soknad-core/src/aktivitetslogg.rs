//! Aktivitetslogg — the append-only ledger of decisions and behov.
//!
//! Every hendelse owns a private log. Entities record informational and
//! warning entries, raise outward `Behov`, and report severe validation
//! failures into it while the hendelse is being dispatched. After a
//! successful dispatch the mediator absorbs the hendelse's log into the
//! aggregate's own log for persistence.
//!
//! Context frames are pushed explicitly as dispatch descends from `Person`
//! via `Soknad` into `Innsending`; each recorded entry snapshots the frame
//! stack at the moment it was written. The log is exclusively owned by the
//! hendelse being processed — it is never shared across aggregates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ─── Context frames ──────────────────────────────────────────────────────────

/// One frame in the context stack: which entity is currently handling the
/// hendelse, with identifying key/value pairs for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kontekst {
  pub kontekst_type: String,
  pub detaljer:      BTreeMap<String, String>,
}

impl Kontekst {
  pub fn ny(kontekst_type: &str) -> Self {
    Self {
      kontekst_type: kontekst_type.to_string(),
      detaljer:      BTreeMap::new(),
    }
  }

  pub fn med(mut self, nokkel: &str, verdi: impl ToString) -> Self {
    self.detaljer.insert(nokkel.to_string(), verdi.to_string());
    self
  }
}

/// Implemented by every entity that contributes a context frame.
pub trait Aktivitetskontekst {
  fn kontekst(&self) -> Kontekst;
}

// ─── Activities ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alvorlighetsgrad {
  Info,
  Varsel,
  Feil,
  Alvorlig,
}

/// A single recorded entry with the context stack as it was when the entry
/// was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aktivitet {
  pub alvorlighetsgrad: Alvorlighetsgrad,
  pub melding:          String,
  pub tidsstempel:      DateTime<Utc>,
  pub kontekster:       Vec<Kontekst>,
}

// ─── Behov ───────────────────────────────────────────────────────────────────

/// The outward asynchronous requests this core can raise on the rapid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehovType {
  /// Ask the form engine to create a new process for a søknad.
  NySoknad,
  /// Ask for an archivable document set (PDF) for an innsending.
  ArkiverbarSoknad,
  /// Ask for a (provisional) journalpost for the archivable documents.
  NyJournalpost,
}

impl BehovType {
  /// The `@behov` discriminator used on the wire.
  pub fn navn(self) -> &'static str {
    match self {
      BehovType::NySoknad => "NySøknad",
      BehovType::ArkiverbarSoknad => "ArkiverbarSøknad",
      BehovType::NyJournalpost => "NyJournalpost",
    }
  }
}

/// An outward request awaiting an asynchronous løsning. The detaljer map
/// must carry enough correlation keys (søknad id, innsending id, ident) that
/// the reply can be routed back to exactly one entity instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Behov {
  pub typ:        BehovType,
  pub detaljer:   BTreeMap<String, serde_json::Value>,
  pub kontekster: Vec<Kontekst>,
}

// ─── Log ─────────────────────────────────────────────────────────────────────

/// Ordered activity entries plus the behov raised while processing one
/// hendelse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Aktivitetslogg {
  aktiviteter: Vec<Aktivitet>,
  behov:       Vec<Behov>,
  #[serde(skip)]
  kontekster:  Vec<Kontekst>,
}

impl Aktivitetslogg {
  pub fn ny() -> Self {
    Self::default()
  }

  /// Push a context frame. Frames are pushed as dispatch descends and are
  /// never popped within one hendelse; the stack is discarded with the log.
  pub fn kontekst(&mut self, kilde: &dyn Aktivitetskontekst) {
    self.ramme(kilde.kontekst());
  }

  /// Push a prebuilt frame. Used for the hendelse's own frame, which
  /// cannot be borrowed alongside its log.
  pub fn ramme(&mut self, kontekst: Kontekst) {
    if self.kontekster.last() != Some(&kontekst) {
      self.kontekster.push(kontekst);
    }
  }

  pub fn info(&mut self, melding: impl Into<String>) {
    self.legg_til(Alvorlighetsgrad::Info, melding.into());
  }

  pub fn varsel(&mut self, melding: impl Into<String>) {
    self.legg_til(Alvorlighetsgrad::Varsel, melding.into());
  }

  pub fn feil(&mut self, melding: impl Into<String>) {
    self.legg_til(Alvorlighetsgrad::Feil, melding.into());
  }

  /// Record a severe validation failure and hand the error back so the
  /// caller can abort the hendelse with `return Err(..)`. Nothing recorded
  /// before this call is lost — the log itself stays intact; it is the
  /// aggregate mutation that must be discarded.
  #[must_use = "a severe activity must abort the current hendelse"]
  pub fn alvorlig(&mut self, feil: Error) -> Error {
    self.legg_til(Alvorlighetsgrad::Alvorlig, feil.to_string());
    feil
  }

  /// Raise an outward behov with the given correlation details.
  pub fn behov(
    &mut self,
    typ: BehovType,
    melding: &str,
    detaljer: BTreeMap<String, serde_json::Value>,
  ) {
    self.info(melding.to_string());
    self.behov.push(Behov {
      typ,
      detaljer,
      kontekster: self.kontekster.clone(),
    });
  }

  fn legg_til(&mut self, alvorlighetsgrad: Alvorlighetsgrad, melding: String) {
    self.aktiviteter.push(Aktivitet {
      alvorlighetsgrad,
      melding,
      tidsstempel: Utc::now(),
      kontekster: self.kontekster.clone(),
    });
  }

  pub fn aktiviteter(&self) -> &[Aktivitet] {
    &self.aktiviteter
  }

  pub fn behovene(&self) -> &[Behov] {
    &self.behov
  }

  /// Move every entry and behov from `annen` into this log, preserving
  /// order. Used by the mediator to fold a hendelse's private log into the
  /// aggregate log before persistence.
  pub fn absorber(&mut self, annen: Aktivitetslogg) {
    self.aktiviteter.extend(annen.aktiviteter);
    self.behov.extend(annen.behov);
  }
}
