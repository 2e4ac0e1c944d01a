//! [`SoknadMediator`] — the per-hendelse orchestration loop.
//!
//! Every inbound hendelse follows the same path: load (or create) the
//! person aggregate, dispatch, and on success persist and publish. A severe
//! domain failure aborts before `lagre`, so no partial mutation ever
//! reaches the store or the rapid.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use chrono::{Duration, Utc};
use soknad_core::{
  hendelse::{
    DokumentkravSvarHendelse, EttersendingHendelse, FaktumOppdatertHendelse,
    Hendelse, OnskeOmNySoknadHendelse, SlettSoknadHendelse,
    SoknadInnsendtHendelse,
  },
  observer::PersonEvent,
  person::Person,
  projection,
  store::LivssyklusStore,
};
use soknad_rapid::{
  melding,
  mottak::{MottakSentral, MottattHendelse},
  RapidPublisher,
};
use thiserror::Error;
use uuid::Uuid;

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MediatorError {
  #[error("domain error: {0}")]
  Core(#[from] soknad_core::Error),

  #[error("no person found for ident")]
  PersonIkkeFunnet(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("rapid error: {0}")]
  Rapid(#[from] soknad_rapid::Error),
}

fn store_feil<E>(feil: E) -> MediatorError
where
  E: std::error::Error + Send + Sync + 'static,
{
  MediatorError::Store(Box::new(feil))
}

pub type Result<T, E = MediatorError> = std::result::Result<T, E>;

// ─── Mediator ────────────────────────────────────────────────────────────────

pub struct SoknadMediator<S, R> {
  store:            Arc<S>,
  rapid:            Arc<R>,
  /// Offset stamped on `innsending_tilstand_endret` events as the estimate
  /// for when the new waiting state should resolve.
  forventet_ferdig: Duration,
  /// soknad id → owner ident, to keep the per-request auth check off the
  /// database hot path.
  eiere:            Mutex<HashMap<Uuid, String>>,
}

impl<S, R> SoknadMediator<S, R>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  pub fn ny(store: Arc<S>, rapid: Arc<R>, forventet_ferdig: Duration) -> Self {
    Self {
      store,
      rapid,
      forventet_ferdig,
      eiere: Mutex::new(HashMap::new()),
    }
  }

  // ── HTTP-driven hendelser ─────────────────────────────────────────────

  /// Start a new søknad. Returns the minted søknad id.
  pub async fn behandle_onske(
    &self,
    mut hendelse: OnskeOmNySoknadHendelse,
  ) -> Result<Uuid> {
    let soknad_id = hendelse.soknad_id;
    self
      .kjor(&mut hendelse, true, |person, h| person.handter_onske(h))
      .await?;
    Ok(soknad_id)
  }

  pub async fn behandle_faktum_oppdatert(
    &self,
    mut hendelse: FaktumOppdatertHendelse,
  ) -> Result<()> {
    self
      .kjor(&mut hendelse, false, |person, h| {
        person.handter_faktum_oppdatert(h)
      })
      .await
  }

  pub async fn behandle_dokumentkrav_svar(
    &self,
    mut hendelse: DokumentkravSvarHendelse,
  ) -> Result<()> {
    self
      .kjor(&mut hendelse, false, |person, h| {
        person.handter_dokumentkrav_svar(h)
      })
      .await
  }

  pub async fn behandle_innsendt(
    &self,
    mut hendelse: SoknadInnsendtHendelse,
  ) -> Result<()> {
    self
      .kjor(&mut hendelse, false, |person, h| person.handter_innsendt(h))
      .await
  }

  /// File an ettersending. Returns the new innsending id.
  pub async fn behandle_ettersending(
    &self,
    mut hendelse: EttersendingHendelse,
  ) -> Result<Uuid> {
    self
      .kjor(&mut hendelse, false, |person, h| {
        person.handter_ettersending(h)
      })
      .await
  }

  pub async fn behandle_slett(
    &self,
    mut hendelse: SlettSoknadHendelse,
  ) -> Result<()> {
    self
      .kjor(&mut hendelse, false, |person, h| person.handter_slett(h))
      .await
  }

  // ── Rapid-driven hendelser ────────────────────────────────────────────

  /// Route one raw melding off the rapid. Packets no listener claims are
  /// skipped; invalid or unprocessable meldinger are logged and swallowed,
  /// there is no caller to answer.
  pub async fn motta_melding(&self, sentral: &MottakSentral, tekst: &str) {
    match sentral.motta(tekst) {
      Ok(Some(hendelse)) => {
        if let Err(feil) = self.behandle_mottatt(hendelse).await {
          tracing::warn!(%feil, "melding forkastet");
        }
      }
      Ok(None) => {}
      Err(feil) => tracing::warn!(%feil, "ugyldig melding forkastet"),
    }
  }

  /// Dispatch one hendelse read off the rapid. The consumer loop logs and
  /// swallows errors — there is no caller to answer.
  pub async fn behandle_mottatt(
    &self,
    mottatt: MottattHendelse,
  ) -> Result<()> {
    match mottatt {
      MottattHendelse::Opprettet(mut hendelse) => {
        self
          .kjor(&mut hendelse, false, |person, h| {
            person.handter_opprettet(h)
          })
          .await
      }
      MottattHendelse::Arkiverbar(mut hendelse) => {
        self
          .kjor(&mut hendelse, false, |person, h| {
            person.handter_arkiverbar(h)
          })
          .await
      }
      MottattHendelse::MidlertidigJournalfort(mut hendelse) => {
        self
          .kjor(&mut hendelse, false, |person, h| {
            person.handter_midlertidig_journalfort(h)
          })
          .await
      }
      MottattHendelse::Journalfort(mut hendelse) => {
        self
          .kjor(&mut hendelse, false, |person, h| {
            person.handter_journalfort(h)
          })
          .await
      }
      MottattHendelse::DokumentkravSammenstilt(mut hendelse) => {
        self
          .kjor(&mut hendelse, false, |person, h| {
            person.handter_dokumentkrav_sammenstilling(h)
          })
          .await
      }
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn hent_person(&self, ident: &str) -> Result<Option<Person>> {
    self.store.hent(ident).await.map_err(store_feil)
  }

  /// Owner ident for a søknad, through the in-memory cache. Ownership
  /// never changes, so a cached entry only goes stale by deletion — and a
  /// deleted søknad fails in the handler anyway.
  pub async fn hent_eier(&self, soknad_id: Uuid) -> Result<Option<String>> {
    let truffet = self
      .eiere
      .lock()
      .ok()
      .and_then(|eiere| eiere.get(&soknad_id).cloned());
    if truffet.is_some() {
      return Ok(truffet);
    }

    let eier = self.store.hent_eier(soknad_id).await.map_err(store_feil)?;
    if let Some(eier) = &eier
      && let Ok(mut eiere) = self.eiere.lock()
    {
      eiere.insert(soknad_id, eier.clone());
    }
    Ok(eier)
  }

  // ── The loop ──────────────────────────────────────────────────────────

  async fn kjor<H, T>(
    &self,
    hendelse: &mut H,
    opprett: bool,
    handter: impl FnOnce(&mut Person, &mut H) -> soknad_core::Result<T>,
  ) -> Result<T>
  where
    H: Hendelse,
  {
    let ident = hendelse.ident().to_string();

    let mut person = match self.store.hent(&ident).await.map_err(store_feil)?
    {
      Some(person) => person,
      None if opprett => Person::ny(&ident),
      None => return Err(MediatorError::PersonIkkeFunnet(ident)),
    };

    let resultat = handter(&mut person, hendelse);
    let logg = hendelse.ta_logg();

    let verdi = match resultat {
      Ok(verdi) => verdi,
      Err(feil) => {
        tracing::warn!(%feil, "hendelse avvist; ingenting lagres");
        return Err(feil.into());
      }
    };

    let utgaaende = person.ta_hendelser();
    person.absorber(logg);
    self.store.lagre(&person).await.map_err(store_feil)?;

    // Publish only after the save: the bus never sees state the store
    // does not have.
    for behov in person.aktivitetslogg().behovene() {
      let melding = melding::behov_melding(&ident, behov);
      self.rapid.publiser(&ident, &melding).await?;
    }
    for event in &utgaaende {
      let melding = self.event_melding(&ident, &person, event);
      self.rapid.publiser(&ident, &melding).await?;
    }

    Ok(verdi)
  }

  fn event_melding(
    &self,
    ident: &str,
    person: &Person,
    event: &PersonEvent,
  ) -> serde_json::Value {
    match event {
      PersonEvent::SoknadEndretTilstand {
        soknad_id,
        forrige,
        gjeldende,
      } => melding::soknad_endret_tilstand(
        ident, *soknad_id, *forrige, *gjeldende,
      ),
      PersonEvent::InnsendingEndretTilstand {
        soknad_id,
        innsending_id,
        innsending_type,
        forrige,
        gjeldende,
      } => melding::innsending_tilstand_endret(
        ident,
        *soknad_id,
        *innsending_id,
        *innsending_type,
        *forrige,
        *gjeldende,
        Utc::now() + self.forventet_ferdig,
      ),
      PersonEvent::SoknadInnsendt {
        soknad_id,
        innsendt_tidspunkt,
      } => melding::soknad_innsendt(
        ident,
        *soknad_id,
        *innsendt_tidspunkt,
        projection::innsending_dokumenter(person, *soknad_id).as_ref(),
      ),
      PersonEvent::SoknadSlettet { soknad_id } => {
        melding::soknad_slettet(ident, *soknad_id)
      }
    }
  }
}
