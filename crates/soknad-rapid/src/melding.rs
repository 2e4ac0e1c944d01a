//! Outbound melding builders.
//!
//! Every melding carries the envelope keys `@event_name`, `@id` and
//! `@opprettet`; behov additionally carry `@behov`, `@behovId` and their
//! correlation keys so the answering service can echo them back.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use soknad_core::{
  aktivitetslogg::Behov,
  innsending::{InnsendingTilstand, InnsendingType},
  projection::InnsendingDokumenter,
  soknad::TilstandType,
};
use uuid::Uuid;

fn konvolutt(event_name: &str) -> Map<String, Value> {
  let mut melding = Map::new();
  melding.insert("@event_name".to_string(), json!(event_name));
  melding.insert("@id".to_string(), json!(Uuid::new_v4()));
  melding.insert("@opprettet".to_string(), json!(Utc::now().to_rfc3339()));
  melding
}

/// A behov packet: envelope + `@behov` type list + a fresh `@behovId` the
/// løsning must echo, plus the behov's own correlation detaljer.
pub fn behov_melding(ident: &str, behov: &Behov) -> Value {
  let mut melding = konvolutt("behov");
  melding.insert("@behov".to_string(), json!([behov.typ.navn()]));
  melding.insert("@behovId".to_string(), json!(Uuid::new_v4()));
  melding.insert("ident".to_string(), json!(ident));
  for (nokkel, verdi) in &behov.detaljer {
    melding.insert(nokkel.clone(), verdi.clone());
  }
  Value::Object(melding)
}

pub fn soknad_endret_tilstand(
  ident: &str,
  soknad_id: Uuid,
  forrige: TilstandType,
  gjeldende: TilstandType,
) -> Value {
  let mut melding = konvolutt("søknad_endret_tilstand");
  melding.insert("søknad_uuid".to_string(), json!(soknad_id));
  melding.insert("ident".to_string(), json!(ident));
  melding.insert("forrigeTilstand".to_string(), json!(forrige.navn()));
  melding.insert("gjeldendeTilstand".to_string(), json!(gjeldende.navn()));
  Value::Object(melding)
}

pub fn innsending_tilstand_endret(
  ident: &str,
  soknad_id: Uuid,
  innsending_id: Uuid,
  innsending_type: InnsendingType,
  forrige: InnsendingTilstand,
  gjeldende: InnsendingTilstand,
  forventet_ferdig: DateTime<Utc>,
) -> Value {
  let type_navn = match innsending_type {
    InnsendingType::NyInnsending => "NyInnsending",
    InnsendingType::Ettersending => "Ettersending",
  };
  let mut melding = konvolutt("innsending_tilstand_endret");
  melding.insert("søknad_uuid".to_string(), json!(soknad_id));
  melding.insert("innsendingId".to_string(), json!(innsending_id));
  melding.insert("ident".to_string(), json!(ident));
  melding.insert("innsendingType".to_string(), json!(type_navn));
  melding.insert("forrigeTilstand".to_string(), json!(forrige.navn()));
  melding.insert("gjeldendeTilstand".to_string(), json!(gjeldende.navn()));
  melding.insert(
    "forventetFerdig".to_string(),
    json!(forventet_ferdig.to_rfc3339()),
  );
  Value::Object(melding)
}

pub fn soknad_slettet(ident: &str, soknad_id: Uuid) -> Value {
  let mut melding = konvolutt("søknad_slettet");
  melding.insert("søknad_uuid".to_string(), json!(soknad_id));
  melding.insert("ident".to_string(), json!(ident));
  Value::Object(melding)
}

pub fn soknad_innsendt(
  ident: &str,
  soknad_id: Uuid,
  innsendt_tidspunkt: DateTime<Utc>,
  dokumenter: Option<&InnsendingDokumenter>,
) -> Value {
  let mut melding = konvolutt("søknad_innsendt");
  melding.insert("søknad_uuid".to_string(), json!(soknad_id));
  melding.insert("ident".to_string(), json!(ident));
  melding.insert(
    "innsendtTidspunkt".to_string(),
    json!(innsendt_tidspunkt.to_rfc3339()),
  );
  if let Some(dokumenter) = dokumenter {
    melding.insert("innsending".to_string(), json!(dokumenter));
  }
  Value::Object(melding)
}
