//! Hendelser — the typed, immutable inputs that drive the state machines.
//!
//! Every trigger the system reacts to is one of these structs: a user
//! intent arriving over HTTP, a løsning packet arriving on the rapid, or
//! the janitor timer. Each hendelse carries the acting ident, the ids
//! needed to route it, and its own private [`Aktivitetslogg`] that the
//! mediator folds into the aggregate log after dispatch.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  aktivitetslogg::{Aktivitetskontekst, Aktivitetslogg, Kontekst},
  dokumentkrav::{Krav, Svar},
  innsending::Dokument,
  soknad::Prosessversjon,
};

/// Common surface the mediator needs from every hendelse.
pub trait Hendelse: Aktivitetskontekst {
  fn ident(&self) -> &str;
  fn logg_mut(&mut self) -> &mut Aktivitetslogg;

  /// Detach the private log so it can be absorbed into the aggregate log.
  fn ta_logg(&mut self) -> Aktivitetslogg {
    std::mem::take(self.logg_mut())
  }
}

macro_rules! hendelse {
  ($navn:ident, $kontekst:literal) => {
    impl Hendelse for $navn {
      fn ident(&self) -> &str {
        &self.ident
      }

      fn logg_mut(&mut self) -> &mut Aktivitetslogg {
        &mut self.logg
      }
    }

    impl Aktivitetskontekst for $navn {
      fn kontekst(&self) -> Kontekst {
        self.kontekst_detaljer(Kontekst::ny($kontekst))
      }
    }
  };
}

// ─── User intents ────────────────────────────────────────────────────────────

/// The user asked to start a new søknad. The søknad id is minted up front
/// so the HTTP layer can return it immediately.
#[derive(Debug)]
pub struct OnskeOmNySoknadHendelse {
  pub ident:       String,
  pub soknad_id:   Uuid,
  pub spraak:      String,
  pub prosessnavn: String,
  pub logg:        Aktivitetslogg,
}

impl OnskeOmNySoknadHendelse {
  pub fn ny(ident: &str, spraak: &str, prosessnavn: &str) -> Self {
    Self {
      ident:       ident.to_string(),
      soknad_id:   Uuid::new_v4(),
      spraak:      spraak.to_string(),
      prosessnavn: prosessnavn.to_string(),
      logg:        Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("søknad_uuid", self.soknad_id)
  }
}

hendelse!(OnskeOmNySoknadHendelse, "OnskeOmNySoknadHendelse");

/// The user changed a faktum answer in the form.
#[derive(Debug)]
pub struct FaktumOppdatertHendelse {
  pub ident:     String,
  pub soknad_id: Uuid,
  pub faktum_id: String,
  pub tidspunkt: DateTime<Utc>,
  pub logg:      Aktivitetslogg,
}

impl FaktumOppdatertHendelse {
  pub fn ny(ident: &str, soknad_id: Uuid, faktum_id: &str) -> Self {
    Self {
      ident:     ident.to_string(),
      soknad_id,
      faktum_id: faktum_id.to_string(),
      tidspunkt: Utc::now(),
      logg:      Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("søknad_uuid", self.soknad_id)
      .med("faktumId", &self.faktum_id)
  }
}

hendelse!(FaktumOppdatertHendelse, "FaktumOppdatertHendelse");

/// The user answered one dokumentkrav (choice and/or files).
#[derive(Debug)]
pub struct DokumentkravSvarHendelse {
  pub ident:     String,
  pub soknad_id: Uuid,
  pub krav_id:   String,
  pub svar:      Svar,
  pub logg:      Aktivitetslogg,
}

impl DokumentkravSvarHendelse {
  pub fn ny(ident: &str, soknad_id: Uuid, krav_id: &str, svar: Svar) -> Self {
    Self {
      ident: ident.to_string(),
      soknad_id,
      krav_id: krav_id.to_string(),
      svar,
      logg: Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("søknad_uuid", self.soknad_id)
      .med("kravId", &self.krav_id)
  }
}

hendelse!(DokumentkravSvarHendelse, "DokumentkravSvarHendelse");

/// The user submitted the søknad.
#[derive(Debug)]
pub struct SoknadInnsendtHendelse {
  pub ident:              String,
  pub soknad_id:          Uuid,
  pub innsendt_tidspunkt: DateTime<Utc>,
  pub logg:               Aktivitetslogg,
}

impl SoknadInnsendtHendelse {
  pub fn ny(ident: &str, soknad_id: Uuid) -> Self {
    Self {
      ident:              ident.to_string(),
      soknad_id,
      innsendt_tidspunkt: Utc::now(),
      logg:               Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("søknad_uuid", self.soknad_id)
  }
}

hendelse!(SoknadInnsendtHendelse, "SoknadInnsendtHendelse");

/// The user filed an ettersending on an already journalført søknad.
#[derive(Debug)]
pub struct EttersendingHendelse {
  pub ident:              String,
  pub soknad_id:          Uuid,
  pub innsendt_tidspunkt: DateTime<Utc>,
  pub logg:               Aktivitetslogg,
}

impl EttersendingHendelse {
  pub fn ny(ident: &str, soknad_id: Uuid) -> Self {
    Self {
      ident:              ident.to_string(),
      soknad_id,
      innsendt_tidspunkt: Utc::now(),
      logg:               Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("søknad_uuid", self.soknad_id)
  }
}

hendelse!(EttersendingHendelse, "EttersendingHendelse");

/// The user deleted the søknad. Only valid before submission.
#[derive(Debug)]
pub struct SlettSoknadHendelse {
  pub ident:     String,
  pub soknad_id: Uuid,
  pub logg:      Aktivitetslogg,
}

impl SlettSoknadHendelse {
  pub fn ny(ident: &str, soknad_id: Uuid) -> Self {
    Self {
      ident:     ident.to_string(),
      soknad_id,
      logg:      Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("søknad_uuid", self.soknad_id)
  }
}

hendelse!(SlettSoknadHendelse, "SlettSoknadHendelse");

// ─── Løsninger from the rapid ────────────────────────────────────────────────

/// The form engine created the process backing the søknad
/// (løsning for [`crate::aktivitetslogg::BehovType::NySoknad`]).
#[derive(Debug)]
pub struct SoknadOpprettetHendelse {
  pub ident:          String,
  pub soknad_id:      Uuid,
  pub behov_id:       Uuid,
  pub prosessversjon: Prosessversjon,
  pub logg:           Aktivitetslogg,
}

impl SoknadOpprettetHendelse {
  pub fn ny(
    ident: &str,
    soknad_id: Uuid,
    behov_id: Uuid,
    prosessversjon: Prosessversjon,
  ) -> Self {
    Self {
      ident: ident.to_string(),
      soknad_id,
      behov_id,
      prosessversjon,
      logg: Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("søknad_uuid", self.soknad_id)
  }
}

hendelse!(SoknadOpprettetHendelse, "SoknadOpprettetHendelse");

/// The archivable document set was produced
/// (løsning for [`crate::aktivitetslogg::BehovType::ArkiverbarSoknad`]).
#[derive(Debug)]
pub struct ArkiverbarSoknadMottattHendelse {
  pub ident:         String,
  pub soknad_id:     Uuid,
  pub innsending_id: Uuid,
  pub behov_id:      Uuid,
  pub hoveddokument: Dokument,
  pub logg:          Aktivitetslogg,
}

impl ArkiverbarSoknadMottattHendelse {
  pub fn ny(
    ident: &str,
    soknad_id: Uuid,
    innsending_id: Uuid,
    behov_id: Uuid,
    hoveddokument: Dokument,
  ) -> Self {
    Self {
      ident: ident.to_string(),
      soknad_id,
      innsending_id,
      behov_id,
      hoveddokument,
      logg: Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("søknad_uuid", self.soknad_id)
      .med("innsendingId", self.innsending_id)
  }
}

hendelse!(ArkiverbarSoknadMottattHendelse, "ArkiverbarSoknadMottattHendelse");

/// A provisional journalpost was created for the innsending
/// (løsning for [`crate::aktivitetslogg::BehovType::NyJournalpost`]).
#[derive(Debug)]
pub struct MidlertidigJournalfortHendelse {
  pub ident:          String,
  pub soknad_id:      Uuid,
  pub innsending_id:  Uuid,
  pub behov_id:       Uuid,
  pub journalpost_id: String,
  pub logg:           Aktivitetslogg,
}

impl MidlertidigJournalfortHendelse {
  pub fn ny(
    ident: &str,
    soknad_id: Uuid,
    innsending_id: Uuid,
    behov_id: Uuid,
    journalpost_id: &str,
  ) -> Self {
    Self {
      ident: ident.to_string(),
      soknad_id,
      innsending_id,
      behov_id,
      journalpost_id: journalpost_id.to_string(),
      logg: Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("søknad_uuid", self.soknad_id)
      .med("journalpostId", &self.journalpost_id)
  }
}

hendelse!(MidlertidigJournalfortHendelse, "MidlertidigJournalfortHendelse");

/// The downstream journalføring completed. Carries no søknad id — the
/// innsending is located through the journalpost index.
#[derive(Debug)]
pub struct JournalfortHendelse {
  pub ident:          String,
  pub journalpost_id: String,
  pub logg:           Aktivitetslogg,
}

impl JournalfortHendelse {
  pub fn ny(ident: &str, journalpost_id: &str) -> Self {
    Self {
      ident:          ident.to_string(),
      journalpost_id: journalpost_id.to_string(),
      logg:           Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("journalpostId", &self.journalpost_id)
  }
}

hendelse!(JournalfortHendelse, "JournalfortHendelse");

/// The form engine re-evaluated which dokumentkrav the answers trigger.
#[derive(Debug)]
pub struct DokumentkravSammenstillingHendelse {
  pub ident:     String,
  pub soknad_id: Uuid,
  pub krav:      Vec<Krav>,
  pub logg:      Aktivitetslogg,
}

impl DokumentkravSammenstillingHendelse {
  pub fn ny(ident: &str, soknad_id: Uuid, krav: Vec<Krav>) -> Self {
    Self {
      ident: ident.to_string(),
      soknad_id,
      krav,
      logg: Aktivitetslogg::ny(),
    }
  }

  fn kontekst_detaljer(&self, kontekst: Kontekst) -> Kontekst {
    kontekst
      .med("ident", &self.ident)
      .med("søknad_uuid", self.soknad_id)
  }
}

hendelse!(
  DokumentkravSammenstillingHendelse,
  "DokumentkravSammenstillingHendelse"
);
