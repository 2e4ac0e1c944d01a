//! Inbound packet parsing and declarative per-listener validation.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Packet ──────────────────────────────────────────────────────────────────

/// A parsed rapid melding: a flat JSON object with typed key accessors.
#[derive(Debug, Clone)]
pub struct Packet {
  felter: Map<String, Value>,
}

impl Packet {
  pub fn fra_json(tekst: &str) -> Result<Self> {
    Self::fra_verdi(serde_json::from_str(tekst)?)
  }

  pub fn fra_verdi(verdi: Value) -> Result<Self> {
    match verdi {
      Value::Object(felter) => Ok(Self { felter }),
      _ => Err(Error::IkkeObjekt),
    }
  }

  /// Present and non-null.
  pub fn har(&self, nokkel: &str) -> bool {
    matches!(self.felter.get(nokkel), Some(v) if !v.is_null())
  }

  pub fn verdi(&self, nokkel: &str) -> Option<&Value> {
    self.felter.get(nokkel).filter(|v| !v.is_null())
  }

  pub fn tekst(&self, nokkel: &str) -> Result<&str> {
    self
      .verdi(nokkel)
      .ok_or_else(|| Error::ManglerNokkel(nokkel.to_string()))?
      .as_str()
      .ok_or(Error::UgyldigType {
        nokkel: nokkel.to_string(),
        ventet: "string",
      })
  }

  pub fn uuid(&self, nokkel: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(self.tekst(nokkel)?)?)
  }

  /// The `@løsning` entry for one behov type.
  pub fn losning(&self, behov: &str) -> Result<&Value> {
    self
      .verdi("@løsning")
      .and_then(|l| l.get(behov))
      .ok_or_else(|| Error::ManglerNokkel(format!("@løsning.{behov}")))
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// Declarative per-listener packet requirements, in the checked order:
/// demanded discriminator values, required keys, forbidden keys.
#[derive(Debug, Clone, Default)]
pub struct PacketSchema {
  krav_verdier:  Vec<(String, Value)>,
  krav_medlem:   Vec<(String, String)>,
  paakrevde:     Vec<String>,
  forbudte:      Vec<String>,
}

impl PacketSchema {
  pub fn ny() -> Self { Self::default() }

  /// The key must hold exactly this value.
  pub fn demand(mut self, nokkel: &str, verdi: impl Into<Value>) -> Self {
    self.krav_verdier.push((nokkel.to_string(), verdi.into()));
    self
  }

  /// The key must hold an array containing this string.
  pub fn demand_inneholder(mut self, nokkel: &str, medlem: &str) -> Self {
    self
      .krav_medlem
      .push((nokkel.to_string(), medlem.to_string()));
    self
  }

  /// The key must be present and non-null.
  pub fn require(mut self, nokkel: &str) -> Self {
    self.paakrevde.push(nokkel.to_string());
    self
  }

  /// The key must be absent (or null).
  pub fn forbid(mut self, nokkel: &str) -> Self {
    self.forbudte.push(nokkel.to_string());
    self
  }

  /// Whether the packet's discriminator keys match this schema. Used to
  /// route a packet to the right listener before full validation.
  pub fn gjelder(&self, packet: &Packet) -> bool {
    self
      .krav_verdier
      .iter()
      .all(|(nokkel, verdi)| packet.verdi(nokkel) == Some(verdi))
      && self.krav_medlem.iter().all(|(nokkel, medlem)| {
        packet
          .verdi(nokkel)
          .and_then(Value::as_array)
          .is_some_and(|liste| {
            liste.iter().any(|v| v.as_str() == Some(medlem))
          })
      })
  }

  pub fn valider(&self, packet: &Packet) -> Result<()> {
    for (nokkel, verdi) in &self.krav_verdier {
      match packet.verdi(nokkel) {
        None => return Err(Error::ManglerNokkel(nokkel.clone())),
        Some(v) if v != verdi => {
          return Err(Error::UventetVerdi {
            nokkel: nokkel.clone(),
            fikk:   v.to_string(),
          });
        }
        Some(_) => {}
      }
    }

    for (nokkel, medlem) in &self.krav_medlem {
      let Some(liste) = packet.verdi(nokkel).and_then(Value::as_array) else {
        return Err(Error::ManglerNokkel(nokkel.clone()));
      };
      if !liste.iter().any(|v| v.as_str() == Some(medlem)) {
        return Err(Error::UventetVerdi {
          nokkel: nokkel.clone(),
          fikk:   Value::Array(liste.clone()).to_string(),
        });
      }
    }

    for nokkel in &self.paakrevde {
      if !packet.har(nokkel) {
        return Err(Error::ManglerNokkel(nokkel.clone()));
      }
    }

    for nokkel in &self.forbudte {
      if packet.har(nokkel) {
        return Err(Error::ForbudtNokkel(nokkel.clone()));
      }
    }

    Ok(())
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
