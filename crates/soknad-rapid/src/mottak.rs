//! Inbound mottak listeners: validated packets become domain hendelser.
//!
//! Each listener owns a [`PacketSchema`]; [`MottakSentral`] routes a raw
//! melding to the first listener whose discriminator keys match. Packets
//! matching no listener are ignored — the rapid carries far more traffic
//! than this service consumes.

use serde_json::Value;
use soknad_core::{
  dokumentkrav::{Krav, Svar},
  hendelse::{
    ArkiverbarSoknadMottattHendelse, DokumentkravSammenstillingHendelse,
    JournalfortHendelse, MidlertidigJournalfortHendelse,
    SoknadOpprettetHendelse,
  },
  innsending::Dokument,
  soknad::Prosessversjon,
};

use crate::{
  packet::{Packet, PacketSchema},
  Error, Result,
};

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// One hendelse read off the rapid, ready for the mediator.
#[derive(Debug)]
pub enum MottattHendelse {
  Opprettet(SoknadOpprettetHendelse),
  Arkiverbar(ArkiverbarSoknadMottattHendelse),
  MidlertidigJournalfort(MidlertidigJournalfortHendelse),
  Journalfort(JournalfortHendelse),
  DokumentkravSammenstilt(DokumentkravSammenstillingHendelse),
}

pub struct MottakSentral {
  ny_soknad:    NySoknadLosningMottak,
  arkiverbar:   ArkiverbarSoknadMottak,
  midlertidig:  MidlertidigJournalfortMottak,
  journalfort:  JournalfortMottak,
  dokumentkrav: DokumentkravSammenstillingMottak,
}

impl Default for MottakSentral {
  fn default() -> Self { Self::ny() }
}

impl MottakSentral {
  pub fn ny() -> Self {
    Self {
      ny_soknad:    NySoknadLosningMottak::ny(),
      arkiverbar:   ArkiverbarSoknadMottak::ny(),
      midlertidig:  MidlertidigJournalfortMottak::ny(),
      journalfort:  JournalfortMottak::ny(),
      dokumentkrav: DokumentkravSammenstillingMottak::ny(),
    }
  }

  /// `Ok(None)` means the packet is not for us.
  pub fn motta(&self, tekst: &str) -> Result<Option<MottattHendelse>> {
    let packet = Packet::fra_json(tekst)?;

    if self.ny_soknad.schema.gjelder(&packet) {
      return self.ny_soknad.les(&packet).map(Some);
    }
    if self.arkiverbar.schema.gjelder(&packet) {
      return self.arkiverbar.les(&packet).map(Some);
    }
    if self.midlertidig.schema.gjelder(&packet) {
      return self.midlertidig.les(&packet).map(Some);
    }
    if self.journalfort.schema.gjelder(&packet) {
      return self.journalfort.les(&packet).map(Some);
    }
    if self.dokumentkrav.schema.gjelder(&packet) {
      return self.dokumentkrav.les(&packet).map(Some);
    }
    Ok(None)
  }
}

// ─── Listeners ───────────────────────────────────────────────────────────────

/// Løsning for `NySøknad`: the form engine created the backing process.
struct NySoknadLosningMottak {
  schema: PacketSchema,
}

impl NySoknadLosningMottak {
  fn ny() -> Self {
    Self {
      schema: PacketSchema::ny()
        .demand("@event_name", "behov")
        .demand_inneholder("@behov", "NySøknad")
        .require("@løsning")
        .require("@behovId")
        .require("søknad_uuid")
        .require("ident"),
    }
  }

  fn les(&self, packet: &Packet) -> Result<MottattHendelse> {
    self.schema.valider(packet)?;

    let losning = packet.losning("NySøknad")?;
    let prosessversjon = prosessversjon(losning)?;

    Ok(MottattHendelse::Opprettet(SoknadOpprettetHendelse::ny(
      packet.tekst("ident")?,
      packet.uuid("søknad_uuid")?,
      packet.uuid("@behovId")?,
      prosessversjon,
    )))
  }
}

fn prosessversjon(losning: &Value) -> Result<Prosessversjon> {
  let navn = losning
    .get("prosessnavn")
    .and_then(Value::as_str)
    .ok_or_else(|| Error::ManglerNokkel("@løsning.NySøknad.prosessnavn".to_string()))?;
  let versjon = losning
    .get("versjon")
    .and_then(Value::as_i64)
    .ok_or_else(|| Error::ManglerNokkel("@løsning.NySøknad.versjon".to_string()))?;
  let versjon = i32::try_from(versjon).map_err(|_| Error::UventetVerdi {
    nokkel: "@løsning.NySøknad.versjon".to_string(),
    fikk:   versjon.to_string(),
  })?;
  Ok(Prosessversjon {
    navn: navn.to_string(),
    versjon,
  })
}

/// Løsning for `ArkiverbarSøknad`: the PDF set was produced.
struct ArkiverbarSoknadMottak {
  schema: PacketSchema,
}

impl ArkiverbarSoknadMottak {
  fn ny() -> Self {
    Self {
      schema: PacketSchema::ny()
        .demand("@event_name", "behov")
        .demand_inneholder("@behov", "ArkiverbarSøknad")
        .require("@løsning")
        .require("@behovId")
        .require("søknad_uuid")
        .require("innsendingId")
        .require("ident"),
    }
  }

  fn les(&self, packet: &Packet) -> Result<MottattHendelse> {
    self.schema.valider(packet)?;

    let hoveddokument: Dokument =
      serde_json::from_value(packet.losning("ArkiverbarSøknad")?.clone())?;

    Ok(MottattHendelse::Arkiverbar(
      ArkiverbarSoknadMottattHendelse::ny(
        packet.tekst("ident")?,
        packet.uuid("søknad_uuid")?,
        packet.uuid("innsendingId")?,
        packet.uuid("@behovId")?,
        hoveddokument,
      ),
    ))
  }
}

/// Løsning for `NyJournalpost`: a provisional journalpost was opened.
struct MidlertidigJournalfortMottak {
  schema: PacketSchema,
}

impl MidlertidigJournalfortMottak {
  fn ny() -> Self {
    Self {
      schema: PacketSchema::ny()
        .demand("@event_name", "behov")
        .demand_inneholder("@behov", "NyJournalpost")
        .require("@løsning")
        .require("@behovId")
        .require("søknad_uuid")
        .require("innsendingId")
        .require("ident"),
    }
  }

  fn les(&self, packet: &Packet) -> Result<MottattHendelse> {
    self.schema.valider(packet)?;

    let losning = packet.losning("NyJournalpost")?;
    let journalpost_id = losning
      .get("journalpostId")
      .and_then(Value::as_str)
      .ok_or_else(|| {
        Error::ManglerNokkel("@løsning.NyJournalpost.journalpostId".to_string())
      })?;

    Ok(MottattHendelse::MidlertidigJournalfort(
      MidlertidigJournalfortHendelse::ny(
        packet.tekst("ident")?,
        packet.uuid("søknad_uuid")?,
        packet.uuid("innsendingId")?,
        packet.uuid("@behovId")?,
        journalpost_id,
      ),
    ))
  }
}

/// The downstream archive confirmed final journalføring. A plain event, so
/// a `@løsning` key here means somebody replayed an answered behov at us.
struct JournalfortMottak {
  schema: PacketSchema,
}

impl JournalfortMottak {
  fn ny() -> Self {
    Self {
      schema: PacketSchema::ny()
        .demand("@event_name", "journalført")
        .require("journalpostId")
        .require("ident")
        .forbid("@løsning"),
    }
  }

  fn les(&self, packet: &Packet) -> Result<MottattHendelse> {
    self.schema.valider(packet)?;

    Ok(MottattHendelse::Journalfort(JournalfortHendelse::ny(
      packet.tekst("ident")?,
      packet.tekst("journalpostId")?,
    )))
  }
}

/// The form engine re-evaluated which dokumentkrav the current answers
/// trigger. Answers already given are preserved by the aggregate.
struct DokumentkravSammenstillingMottak {
  schema: PacketSchema,
}

impl DokumentkravSammenstillingMottak {
  fn ny() -> Self {
    Self {
      schema: PacketSchema::ny()
        .demand("@event_name", "dokumentkrav_sammenstilt")
        .require("søknad_uuid")
        .require("ident")
        .require("krav"),
    }
  }

  fn les(&self, packet: &Packet) -> Result<MottattHendelse> {
    self.schema.valider(packet)?;

    let Some(liste) = packet.verdi("krav").and_then(Value::as_array) else {
      return Err(Error::UgyldigType {
        nokkel: "krav".to_string(),
        ventet: "array",
      });
    };

    let krav = liste
      .iter()
      .map(|k| {
        let krav_id = k
          .get("id")
          .and_then(Value::as_str)
          .ok_or_else(|| Error::ManglerNokkel("krav[].id".to_string()))?;
        let beskrivende_id = k
          .get("beskrivendeId")
          .and_then(Value::as_str)
          .ok_or_else(|| {
            Error::ManglerNokkel("krav[].beskrivendeId".to_string())
          })?;
        Ok(Krav {
          krav_id:        krav_id.to_string(),
          beskrivende_id: beskrivende_id.to_string(),
          svar:           Svar::default(),
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(MottattHendelse::DokumentkravSammenstilt(
      DokumentkravSammenstillingHendelse::ny(
        packet.tekst("ident")?,
        packet.uuid("søknad_uuid")?,
        krav,
      ),
    ))
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use serde_json::json;
  use uuid::Uuid;

  use super::*;

  const IDENT: &str = "12345678912";

  #[test]
  fn unrelated_packets_are_ignored() {
    let sentral = MottakSentral::ny();
    let melding = json!({
      "@event_name": "faktum_svar_lagret",
      "ident": IDENT,
    });
    assert!(sentral.motta(&melding.to_string()).unwrap().is_none());
  }

  #[test]
  fn ny_soknad_losning_becomes_opprettet_hendelse() {
    let sentral = MottakSentral::ny();
    let soknad_id = Uuid::new_v4();
    let behov_id = Uuid::new_v4();
    let melding = json!({
      "@event_name": "behov",
      "@behov": ["NySøknad"],
      "@behovId": behov_id,
      "søknad_uuid": soknad_id,
      "ident": IDENT,
      "@løsning": { "NySøknad": { "prosessnavn": "Dagpenger", "versjon": 42 } },
    });

    let mottatt = sentral.motta(&melding.to_string()).unwrap().unwrap();
    let MottattHendelse::Opprettet(hendelse) = mottatt else {
      panic!("expected Opprettet");
    };
    assert_eq!(hendelse.soknad_id, soknad_id);
    assert_eq!(hendelse.behov_id, behov_id);
    assert_eq!(hendelse.prosessversjon.navn, "Dagpenger");
    assert_eq!(hendelse.prosessversjon.versjon, 42);
  }

  #[test]
  fn out_of_range_prosessversjon_is_rejected() {
    let sentral = MottakSentral::ny();
    let melding = json!({
      "@event_name": "behov",
      "@behov": ["NySøknad"],
      "@behovId": Uuid::new_v4(),
      "søknad_uuid": Uuid::new_v4(),
      "ident": IDENT,
      "@løsning": {
        "NySøknad": { "prosessnavn": "Dagpenger", "versjon": 5_000_000_000i64 }
      },
    });
    assert!(matches!(
      sentral.motta(&melding.to_string()),
      Err(Error::UventetVerdi { .. })
    ));
  }

  #[test]
  fn unanswered_behov_fails_validation() {
    // No @løsning yet: the behov is still out for answering.
    let sentral = MottakSentral::ny();
    let melding = json!({
      "@event_name": "behov",
      "@behov": ["NySøknad"],
      "@behovId": Uuid::new_v4(),
      "søknad_uuid": Uuid::new_v4(),
      "ident": IDENT,
    });
    assert!(sentral.motta(&melding.to_string()).is_err());
  }

  #[test]
  fn ny_journalpost_losning_becomes_midlertidig_hendelse() {
    let sentral = MottakSentral::ny();
    let melding = json!({
      "@event_name": "behov",
      "@behov": ["NyJournalpost"],
      "@behovId": Uuid::new_v4(),
      "søknad_uuid": Uuid::new_v4(),
      "innsendingId": Uuid::new_v4(),
      "ident": IDENT,
      "@løsning": { "NyJournalpost": { "journalpostId": "J123" } },
    });

    let mottatt = sentral.motta(&melding.to_string()).unwrap().unwrap();
    let MottattHendelse::MidlertidigJournalfort(hendelse) = mottatt else {
      panic!("expected MidlertidigJournalfort");
    };
    assert_eq!(hendelse.journalpost_id, "J123");
  }

  #[test]
  fn journalfort_event_becomes_journalfort_hendelse() {
    let sentral = MottakSentral::ny();
    let melding = json!({
      "@event_name": "journalført",
      "journalpostId": "J123",
      "ident": IDENT,
    });

    let mottatt = sentral.motta(&melding.to_string()).unwrap().unwrap();
    let MottattHendelse::Journalfort(hendelse) = mottatt else {
      panic!("expected Journalfort");
    };
    assert_eq!(hendelse.journalpost_id, "J123");
    assert_eq!(hendelse.ident, IDENT);
  }

  #[test]
  fn dokumentkrav_sammenstilling_reads_the_krav_list() {
    let sentral = MottakSentral::ny();
    let melding = json!({
      "@event_name": "dokumentkrav_sammenstilt",
      "søknad_uuid": Uuid::new_v4(),
      "ident": IDENT,
      "krav": [
        { "id": "f1", "beskrivendeId": "faktum.arbeidsforhold" },
        { "id": "f2", "beskrivendeId": "faktum.inntekt" },
      ],
    });

    let mottatt = sentral.motta(&melding.to_string()).unwrap().unwrap();
    let MottattHendelse::DokumentkravSammenstilt(hendelse) = mottatt else {
      panic!("expected DokumentkravSammenstilt");
    };
    assert_eq!(hendelse.krav.len(), 2);
    assert_eq!(hendelse.krav[0].krav_id, "f1");
    assert!(hendelse.krav[1].svar.valg.is_none());
  }

  #[test]
  fn arkiverbar_losning_carries_the_dokument() {
    let sentral = MottakSentral::ny();
    let melding = json!({
      "@event_name": "behov",
      "@behov": ["ArkiverbarSøknad"],
      "@behovId": Uuid::new_v4(),
      "søknad_uuid": Uuid::new_v4(),
      "innsendingId": Uuid::new_v4(),
      "ident": IDENT,
      "@løsning": { "ArkiverbarSøknad": {
        "dokument_id": Uuid::new_v4(),
        "krav_id": null,
        "skjemakode": "NAV 04-01.02",
        "varianter": [{
          "variant_id": Uuid::new_v4(),
          "filnavn": "soknad.pdf",
          "urn": "urn:dokument:1",
          "variant": "ARKIV",
          "mime_type": "application/pdf",
        }],
      }},
    });

    let mottatt = sentral.motta(&melding.to_string()).unwrap().unwrap();
    let MottattHendelse::Arkiverbar(hendelse) = mottatt else {
      panic!("expected Arkiverbar");
    };
    assert_eq!(hendelse.hoveddokument.varianter.len(), 1);
    assert_eq!(
      hendelse.hoveddokument.skjemakode.as_deref(),
      Some("NAV 04-01.02")
    );
  }
}
