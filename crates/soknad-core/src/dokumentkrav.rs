//! Dokumentkrav — supporting documents the user must provide or decline.
//!
//! Each krav is raised by the form engine while the søknad is being filled
//! in. The user either uploads files for it or answers why none will come.
//! The collection is frozen together with the rest of the søknad once it is
//! submitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single uploaded file backing a krav. The binary itself lives in the
/// external file store; we only keep its URN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fil {
  pub fil_id:    Uuid,
  pub filnavn:   String,
  pub urn:       String,
  pub storrelse: u64,
  pub tidspunkt: DateTime<Utc>,
}

/// The user's answer to a krav.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvarValg {
  SendNaa,
  SendSenere,
  SenderIkke,
  AlleredeSendt,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Svar {
  pub valg:        Option<SvarValg>,
  pub begrunnelse: Option<String>,
  pub filer:       Vec<Fil>,
}

impl Svar {
  /// A krav is answered when the user made a choice, and — if the choice
  /// was to send now — at least one file is attached.
  pub fn er_besvart(&self) -> bool {
    match self.valg {
      Some(SvarValg::SendNaa) => !self.filer.is_empty(),
      Some(_) => true,
      None => false,
    }
  }
}

/// One document requirement, identified by the form engine's faktum id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Krav {
  pub krav_id:        String,
  pub beskrivende_id: String,
  pub svar:           Svar,
}

/// The søknad's collection of dokumentkrav.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dokumentkrav {
  krav: Vec<Krav>,
}

impl Dokumentkrav {
  pub fn ny() -> Self {
    Self::default()
  }

  /// Replace the requirement set with what the form engine currently
  /// demands, keeping answers already given for surviving krav.
  pub fn sammenstill(&mut self, aktive: Vec<Krav>) {
    let gamle = std::mem::take(&mut self.krav);
    self.krav = aktive
      .into_iter()
      .map(|mut krav| {
        if let Some(gammel) =
          gamle.iter().find(|g| g.krav_id == krav.krav_id)
        {
          krav.svar = gammel.svar.clone();
        }
        krav
      })
      .collect();
  }

  /// Record the user's answer for one krav. Returns `false` if the krav is
  /// unknown.
  pub fn besvar(&mut self, krav_id: &str, svar: Svar) -> bool {
    match self.krav.iter_mut().find(|k| k.krav_id == krav_id) {
      Some(krav) => {
        krav.svar = svar;
        true
      }
      None => false,
    }
  }

  pub fn krav(&self) -> &[Krav] {
    &self.krav
  }

  /// The krav the user chose to send with the søknad now.
  pub fn leveres_naa(&self) -> impl Iterator<Item = &Krav> {
    self
      .krav
      .iter()
      .filter(|k| k.svar.valg == Some(SvarValg::SendNaa))
  }

  pub fn er_komplett(&self) -> bool {
    self.krav.iter().all(|k| k.svar.er_besvart())
  }
}
