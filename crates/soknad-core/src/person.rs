//! Person — the aggregate root owning a user's søknader.
//!
//! The person routes every hendelse to the right søknad (by søknad id, or
//! by journalpost id for journalføring confirmations), enforces the
//! one-in-progress rule, and collects the outbound domain events its
//! søknader emit so the mediator can publish them after a successful
//! dispatch.

use uuid::Uuid;

use crate::{
  aktivitetslogg::{Aktivitetskontekst, Aktivitetslogg, Kontekst},
  error::{Error, Result},
  hendelse::{
    ArkiverbarSoknadMottattHendelse, DokumentkravSammenstillingHendelse,
    DokumentkravSvarHendelse, EttersendingHendelse, FaktumOppdatertHendelse,
    Hendelse, JournalfortHendelse, MidlertidigJournalfortHendelse,
    OnskeOmNySoknadHendelse, SlettSoknadHendelse, SoknadInnsendtHendelse,
    SoknadOpprettetHendelse,
  },
  observer::PersonEvent,
  soknad::Soknad,
};

#[derive(Debug)]
pub struct Person {
  ident:          String,
  soknader:       Vec<Soknad>,
  aktivitetslogg: Aktivitetslogg,
  utgaaende:      Vec<PersonEvent>,
}

impl PartialEq for Person {
  fn eq(&self, other: &Self) -> bool {
    self.ident == other.ident
  }
}

impl Eq for Person {}

impl Aktivitetskontekst for Person {
  fn kontekst(&self) -> Kontekst {
    Kontekst::ny("Person").med("ident", &self.ident)
  }
}

impl Person {
  pub fn ny(ident: &str) -> Self {
    Self {
      ident:          ident.to_string(),
      soknader:       Vec::new(),
      aktivitetslogg: Aktivitetslogg::ny(),
      utgaaende:      Vec::new(),
    }
  }

  /// Rebuild a persisted person from its søknader. The activity log starts
  /// empty; persisted entries are insert-only history, not working state.
  pub fn rehydrer(ident: &str, soknader: Vec<Soknad>) -> Self {
    Self {
      ident:          ident.to_string(),
      soknader,
      aktivitetslogg: Aktivitetslogg::ny(),
      utgaaende:      Vec::new(),
    }
  }

  pub fn ident(&self) -> &str {
    &self.ident
  }

  pub fn soknader(&self) -> &[Soknad] {
    &self.soknader
  }

  /// Drain the domain events emitted since the last drain, in emission
  /// order.
  pub fn ta_hendelser(&mut self) -> Vec<PersonEvent> {
    std::mem::take(&mut self.utgaaende)
  }

  /// Fold a hendelse's private log into the aggregate log for persistence.
  pub fn absorber(&mut self, logg: Aktivitetslogg) {
    self.aktivitetslogg.absorber(logg);
  }

  pub fn aktivitetslogg(&self) -> &Aktivitetslogg {
    &self.aktivitetslogg
  }

  // ── Dispatch ──────────────────────────────────────────────────────────

  /// At most one søknad per person may be in progress.
  pub fn handter_onske(
    &mut self,
    hendelse: &mut OnskeOmNySoknadHendelse,
  ) -> Result<()> {
    self.apne(hendelse);
    if let Some(aktiv) =
      self.soknader.iter().find(|s| s.tilstand().er_aktiv())
    {
      return Err(hendelse.logg.alvorlig(Error::AlleredePaabegynt {
        ident:     self.ident.clone(),
        soknad_id: aktiv.soknad_id(),
      }));
    }
    let mut soknad =
      Soknad::ny(hendelse.soknad_id, &self.ident, &hendelse.spraak);
    soknad.handter_onske(&hendelse.prosessnavn, &mut hendelse.logg);
    self.soknader.push(soknad);
    Ok(())
  }

  pub fn handter_opprettet(
    &mut self,
    hendelse: &mut SoknadOpprettetHendelse,
  ) -> Result<()> {
    self.apne(hendelse);
    let indeks = self.finn(hendelse.soknad_id, &mut hendelse.logg)?;
    self.soknader[indeks].handter_opprettet(
      hendelse.behov_id,
      Some(hendelse.prosessversjon.clone()),
      &mut hendelse.logg,
      &mut self.utgaaende,
    )
  }

  pub fn handter_faktum_oppdatert(
    &mut self,
    hendelse: &mut FaktumOppdatertHendelse,
  ) -> Result<()> {
    self.apne(hendelse);
    let indeks = self.finn(hendelse.soknad_id, &mut hendelse.logg)?;
    self.soknader[indeks]
      .handter_faktum_oppdatert(hendelse.tidspunkt, &mut hendelse.logg)
  }

  pub fn handter_dokumentkrav_sammenstilling(
    &mut self,
    hendelse: &mut DokumentkravSammenstillingHendelse,
  ) -> Result<()> {
    self.apne(hendelse);
    let indeks = self.finn(hendelse.soknad_id, &mut hendelse.logg)?;
    self.soknader[indeks].handter_dokumentkrav_sammenstilling(
      std::mem::take(&mut hendelse.krav),
      &mut hendelse.logg,
    )
  }

  pub fn handter_dokumentkrav_svar(
    &mut self,
    hendelse: &mut DokumentkravSvarHendelse,
  ) -> Result<()> {
    self.apne(hendelse);
    let indeks = self.finn(hendelse.soknad_id, &mut hendelse.logg)?;
    self.soknader[indeks].handter_dokumentkrav_svar(
      &hendelse.krav_id,
      hendelse.svar.clone(),
      &mut hendelse.logg,
    )
  }

  pub fn handter_innsendt(
    &mut self,
    hendelse: &mut SoknadInnsendtHendelse,
  ) -> Result<()> {
    self.apne(hendelse);
    let indeks = self.finn(hendelse.soknad_id, &mut hendelse.logg)?;
    self.soknader[indeks].handter_innsendt(
      hendelse.innsendt_tidspunkt,
      &mut hendelse.logg,
      &mut self.utgaaende,
    )
  }

  pub fn handter_arkiverbar(
    &mut self,
    hendelse: &mut ArkiverbarSoknadMottattHendelse,
  ) -> Result<()> {
    self.apne(hendelse);
    let indeks = self.finn(hendelse.soknad_id, &mut hendelse.logg)?;
    self.soknader[indeks].handter_arkiverbar(
      hendelse.innsending_id,
      hendelse.behov_id,
      &hendelse.hoveddokument,
      &mut hendelse.logg,
      &mut self.utgaaende,
    )
  }

  pub fn handter_midlertidig_journalfort(
    &mut self,
    hendelse: &mut MidlertidigJournalfortHendelse,
  ) -> Result<()> {
    self.apne(hendelse);
    let indeks = self.finn(hendelse.soknad_id, &mut hendelse.logg)?;
    self.soknader[indeks].handter_midlertidig_journalfort(
      hendelse.innsending_id,
      hendelse.behov_id,
      &hendelse.journalpost_id,
      &mut hendelse.logg,
      &mut self.utgaaende,
    )
  }

  /// Journalføring confirmations carry no søknad id; the søknad is found
  /// through the journalpost it owns.
  pub fn handter_journalfort(
    &mut self,
    hendelse: &mut JournalfortHendelse,
  ) -> Result<()> {
    self.apne(hendelse);
    let indeks = self
      .soknader
      .iter()
      .position(|s| s.eier_journalpost(&hendelse.journalpost_id));
    let Some(indeks) = indeks else {
      return Err(hendelse.logg.alvorlig(Error::JournalpostIkkeFunnet(
        hendelse.journalpost_id.clone(),
      )));
    };
    self.soknader[indeks].handter_journalfort(
      &hendelse.journalpost_id,
      &mut hendelse.logg,
      &mut self.utgaaende,
    )
  }

  pub fn handter_slett(
    &mut self,
    hendelse: &mut SlettSoknadHendelse,
  ) -> Result<()> {
    self.apne(hendelse);
    let indeks = self.finn(hendelse.soknad_id, &mut hendelse.logg)?;
    self.soknader[indeks]
      .handter_slett(&mut hendelse.logg, &mut self.utgaaende)
  }

  pub fn handter_ettersending(
    &mut self,
    hendelse: &mut EttersendingHendelse,
  ) -> Result<Uuid> {
    self.apne(hendelse);
    let indeks = self.finn(hendelse.soknad_id, &mut hendelse.logg)?;
    self.soknader[indeks].handter_ettersending(
      hendelse.innsendt_tidspunkt,
      &mut hendelse.logg,
      &mut self.utgaaende,
    )
  }

  // ── Internals ─────────────────────────────────────────────────────────

  /// Open the hendelse's log for dispatch: the hendelse's own frame goes
  /// first so every entry records which hendelse was being handled, then
  /// the person frame.
  fn apne<H: Hendelse>(&self, hendelse: &mut H) {
    let ramme = hendelse.kontekst();
    let logg = hendelse.logg_mut();
    logg.ramme(ramme);
    logg.kontekst(self);
  }

  fn finn(
    &self,
    soknad_id: Uuid,
    logg: &mut Aktivitetslogg,
  ) -> Result<usize> {
    self
      .soknader
      .iter()
      .position(|s| s.soknad_id() == soknad_id)
      .ok_or_else(|| logg.alvorlig(Error::SoknadIkkeFunnet(soknad_id)))
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;
  use crate::{
    innsending::{Dokument, Dokumentvariant, InnsendingType},
    soknad::{Prosessversjon, TilstandType},
  };

  const IDENT: &str = "12345678912";

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

  /// Drive a person through ønske + opprettet and return the søknad id.
  fn person_med_paabegynt_soknad() -> (Person, Uuid) {
    let mut person = Person::ny(IDENT);
    let mut onske = OnskeOmNySoknadHendelse::ny(IDENT, "NB", "Dagpenger");
    let soknad_id = onske.soknad_id;
    person.handter_onske(&mut onske).unwrap();

    let mut opprettet = SoknadOpprettetHendelse::ny(
      IDENT,
      soknad_id,
      Uuid::new_v4(),
      Prosessversjon {
        navn:    "Dagpenger".to_string(),
        versjon: 42,
      },
    );
    person.handter_opprettet(&mut opprettet).unwrap();
    (person, soknad_id)
  }

  fn innsending_id(person: &Person) -> Uuid {
    person.soknader()[0].innsending().unwrap().innsending_id()
  }

  #[test]
  fn entries_record_the_dispatching_hendelse_frame() {
    let (mut person, soknad_id) = person_med_paabegynt_soknad();

    let mut innsendt = SoknadInnsendtHendelse::ny(IDENT, soknad_id);
    person.handter_innsendt(&mut innsendt).unwrap();

    let logg = innsendt.ta_logg();
    let kontekster = &logg.aktiviteter()[0].kontekster;
    assert_eq!(kontekster[0].kontekst_type, "SoknadInnsendtHendelse");
    assert_eq!(kontekster[0].detaljer["søknad_uuid"], soknad_id.to_string());
    assert_eq!(kontekster[1].kontekst_type, "Person");
  }

  /// Scenario: create → submit → arkiverbar → midlertidig journalført →
  /// journalført. The observer sees all six states in order.
  #[test]
  fn full_lifecycle_reaches_journalfort() {
    let (mut person, soknad_id) = person_med_paabegynt_soknad();

    let mut innsendt = SoknadInnsendtHendelse::ny(IDENT, soknad_id);
    person.handter_innsendt(&mut innsendt).unwrap();
    let innsending = innsending_id(&person);

    let mut arkiverbar = ArkiverbarSoknadMottattHendelse::ny(
      IDENT,
      soknad_id,
      innsending,
      Uuid::new_v4(),
      dokument(),
    );
    person.handter_arkiverbar(&mut arkiverbar).unwrap();

    let mut midlertidig = MidlertidigJournalfortHendelse::ny(
      IDENT,
      soknad_id,
      innsending,
      Uuid::new_v4(),
      "J123",
    );
    person
      .handter_midlertidig_journalfort(&mut midlertidig)
      .unwrap();

    let mut journalfort = JournalfortHendelse::ny(IDENT, "J123");
    person.handter_journalfort(&mut journalfort).unwrap();

    assert_eq!(
      person.soknader()[0].tilstand(),
      TilstandType::Journalfort
    );

    // The observed state sequence: initial state plus five transitions.
    let hendelser = person.ta_hendelser();
    let mut observert = Vec::new();
    for hendelse in &hendelser {
      if let PersonEvent::SoknadEndretTilstand {
        forrige,
        gjeldende,
        ..
      } = hendelse
      {
        if observert.is_empty() {
          observert.push(*forrige);
        }
        observert.push(*gjeldende);
      }
    }
    assert_eq!(observert, vec![
      TilstandType::UnderOpprettelse,
      TilstandType::Paabegynt,
      TilstandType::AvventerArkiverbarSoknad,
      TilstandType::AvventerMidlertidigJournalforing,
      TilstandType::AvventerJournalforing,
      TilstandType::Journalfort,
    ]);
  }

  /// A second wish while the first søknad is in progress is refused and no
  /// søknad is created.
  #[test]
  fn second_wish_while_in_progress_is_severe() {
    let (mut person, _) = person_med_paabegynt_soknad();

    let mut onske = OnskeOmNySoknadHendelse::ny(IDENT, "NB", "Dagpenger");
    let feil = person.handter_onske(&mut onske).unwrap_err();
    assert!(matches!(feil, Error::AlleredePaabegynt { .. }));
    assert_eq!(person.soknader().len(), 1);
  }

  /// After the first søknad reaches a terminal state a new one is allowed.
  #[test]
  fn new_wish_is_allowed_after_delete() {
    let (mut person, soknad_id) = person_med_paabegynt_soknad();

    let mut slett = SlettSoknadHendelse::ny(IDENT, soknad_id);
    person.handter_slett(&mut slett).unwrap();

    let mut onske = OnskeOmNySoknadHendelse::ny(IDENT, "NB", "Dagpenger");
    person.handter_onske(&mut onske).unwrap();
    assert_eq!(person.soknader().len(), 2);
  }

  /// Delivering the journal confirmation twice yields exactly one
  /// Journalført transition.
  #[test]
  fn duplicate_journalforing_fires_exactly_one_transition() {
    let (mut person, soknad_id) = person_med_paabegynt_soknad();
    let mut innsendt = SoknadInnsendtHendelse::ny(IDENT, soknad_id);
    person.handter_innsendt(&mut innsendt).unwrap();
    let innsending = innsending_id(&person);

    let mut arkiverbar = ArkiverbarSoknadMottattHendelse::ny(
      IDENT,
      soknad_id,
      innsending,
      Uuid::new_v4(),
      dokument(),
    );
    person.handter_arkiverbar(&mut arkiverbar).unwrap();
    let mut midlertidig = MidlertidigJournalfortHendelse::ny(
      IDENT,
      soknad_id,
      innsending,
      Uuid::new_v4(),
      "J123",
    );
    person
      .handter_midlertidig_journalfort(&mut midlertidig)
      .unwrap();

    let mut forste = JournalfortHendelse::ny(IDENT, "J123");
    person.handter_journalfort(&mut forste).unwrap();
    let mut andre = JournalfortHendelse::ny(IDENT, "J123");
    person.handter_journalfort(&mut andre).unwrap();

    let hendelser = person.ta_hendelser();
    let journalfort_overganger = hendelser
      .iter()
      .filter(|e| {
        matches!(
          e,
          PersonEvent::SoknadEndretTilstand {
            gjeldende: TilstandType::Journalfort,
            ..
          }
        )
      })
      .count();
    assert_eq!(journalfort_overganger, 1);
  }

  /// Replaying the arkiverbar løsning with a fresh behov id is still a
  /// no-op once the innsending has moved on.
  #[test]
  fn replayed_arkiverbar_solution_does_not_reemit_behov() {
    let (mut person, soknad_id) = person_med_paabegynt_soknad();
    let mut innsendt = SoknadInnsendtHendelse::ny(IDENT, soknad_id);
    person.handter_innsendt(&mut innsendt).unwrap();
    let innsending = innsending_id(&person);

    let mut forste = ArkiverbarSoknadMottattHendelse::ny(
      IDENT,
      soknad_id,
      innsending,
      Uuid::new_v4(),
      dokument(),
    );
    person.handter_arkiverbar(&mut forste).unwrap();
    assert_eq!(forste.logg.behovene().len(), 1);

    let mut replay = ArkiverbarSoknadMottattHendelse::ny(
      IDENT,
      soknad_id,
      innsending,
      Uuid::new_v4(),
      dokument(),
    );
    person.handter_arkiverbar(&mut replay).unwrap();
    assert!(replay.logg.behovene().is_empty());
    assert_eq!(
      person.soknader()[0].tilstand(),
      TilstandType::AvventerMidlertidigJournalforing
    );
  }

  #[test]
  fn event_for_unknown_soknad_is_severe_not_found() {
    let mut person = Person::ny(IDENT);
    let mut innsendt = SoknadInnsendtHendelse::ny(IDENT, Uuid::new_v4());
    let feil = person.handter_innsendt(&mut innsendt).unwrap_err();
    assert!(matches!(feil, Error::SoknadIkkeFunnet(_)));
  }

  #[test]
  fn ettersending_round_trip_after_journalforing() {
    let (mut person, soknad_id) = person_med_paabegynt_soknad();
    let mut innsendt = SoknadInnsendtHendelse::ny(IDENT, soknad_id);
    person.handter_innsendt(&mut innsendt).unwrap();
    let innsending = innsending_id(&person);

    let mut arkiverbar = ArkiverbarSoknadMottattHendelse::ny(
      IDENT,
      soknad_id,
      innsending,
      Uuid::new_v4(),
      dokument(),
    );
    person.handter_arkiverbar(&mut arkiverbar).unwrap();
    let mut midlertidig = MidlertidigJournalfortHendelse::ny(
      IDENT,
      soknad_id,
      innsending,
      Uuid::new_v4(),
      "J123",
    );
    person
      .handter_midlertidig_journalfort(&mut midlertidig)
      .unwrap();
    let mut journalfort = JournalfortHendelse::ny(IDENT, "J123");
    person.handter_journalfort(&mut journalfort).unwrap();

    let mut ettersending = EttersendingHendelse::ny(IDENT, soknad_id);
    let ettersending_id =
      person.handter_ettersending(&mut ettersending).unwrap();
    assert_eq!(ettersending.logg.behovene().len(), 1);

    let soknad = &person.soknader()[0];
    let barn = &soknad.innsending().unwrap().ettersendinger()[0];
    assert_eq!(barn.innsending_id(), ettersending_id);
    assert_eq!(barn.innsending_type(), InnsendingType::Ettersending);
    // The søknad itself stays journalført while the ettersending runs.
    assert_eq!(soknad.tilstand(), TilstandType::Journalfort);
    assert!(soknad.innsendt_tidspunkt().is_some());
  }
}
