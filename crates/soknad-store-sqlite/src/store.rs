//! [`SqliteStore`] — the SQLite implementation of [`LivssyklusStore`].

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use soknad_core::{
  person::Person,
  projection::PaabegyntSoknad,
  soknad::Soknad,
  store::LivssyklusStore,
};

use crate::{
  encode::{
    decode_dt, decode_uuid, encode_alvorlighetsgrad, encode_dt, encode_uuid,
    RawInnsending, RawSoknad,
  },
  schema::SCHEMA,
  Error, Result,
};

/// How long a crashed instance can hold the janitor lock before another
/// instance is allowed to steal it.
fn janitor_laas_utlop() -> Duration { Duration::minutes(15) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A søknad lifecycle store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row assembly ────────────────────────────────────────────────────────────

fn soknad_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSoknad> {
  Ok(RawSoknad {
    soknad_id:             row.get(0)?,
    ident:                 row.get(1)?,
    tilstand:              row.get(2)?,
    spraak:                row.get(3)?,
    opprettet:             row.get(4)?,
    innsendt_tidspunkt:    row.get(5)?,
    sist_endret_av_bruker: row.get(6)?,
    prosessnavn:           row.get(7)?,
    prosessversjon:        row.get(8)?,
    dokumentkrav:          row.get(9)?,
    behandlede_behov:      row.get(10)?,
    versjon:               row.get(11)?,
  })
}

fn innsending_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawInnsending> {
  Ok(RawInnsending {
    innsending_id:   row.get(0)?,
    soknad_id:       row.get(1)?,
    forelder_id:     row.get(2)?,
    ident:           row.get(3)?,
    innsending_type: row.get(4)?,
    tilstand:        row.get(5)?,
    innsendt:        row.get(6)?,
    journalpost_id:  row.get(7)?,
    skjemakode:      row.get(8)?,
    hoveddokument:   row.get(9)?,
    dokumenter:      row.get(10)?,
  })
}

const SOKNAD_COLS: &str = "soknad_id, ident, tilstand, spraak, opprettet, \
   innsendt_tidspunkt, sist_endret_av_bruker, prosessnavn, prosessversjon, \
   dokumentkrav, behandlede_behov, versjon";

const INNSENDING_COLS: &str = "innsending_id, soknad_id, forelder_id, ident, \
   innsending_type, tilstand, innsendt, journalpost_id, skjemakode, \
   hoveddokument, dokumenter";

/// Pair each søknad with its primary innsending and that innsending's
/// ettersendinger.
fn bygg_soknader(
  raw_soknader: Vec<RawSoknad>,
  raw_innsendinger: Vec<RawInnsending>,
) -> Result<Vec<Soknad>> {
  let mut soknader = Vec::with_capacity(raw_soknader.len());
  let mut rester = raw_innsendinger;

  for raw in raw_soknader {
    let (mine, andre): (Vec<_>, Vec<_>) = rester
      .into_iter()
      .partition(|ri| ri.soknad_id == raw.soknad_id);
    rester = andre;

    let (primaere, barn): (Vec<_>, Vec<_>) =
      mine.into_iter().partition(|ri| ri.forelder_id.is_none());

    let innsending = match primaere.into_iter().next() {
      Some(primaer) => {
        let ettersendinger = barn
          .into_iter()
          .map(|b| b.into_innsending(Vec::new()))
          .collect::<Result<Vec<_>>>()?;
        Some(primaer.into_innsending(ettersendinger)?)
      }
      None => None,
    };

    soknader.push(raw.into_soknad(innsending)?);
  }

  Ok(soknader)
}

// ─── LivssyklusStore impl ────────────────────────────────────────────────────

impl LivssyklusStore for SqliteStore {
  type Error = Error;

  async fn hent<'a>(&'a self, ident: &'a str) -> Result<Option<Person>> {
    let ident_owned = ident.to_string();

    let (raw_soknader, raw_innsendinger): (Vec<RawSoknad>, Vec<RawInnsending>) =
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&format!(
            "SELECT {SOKNAD_COLS} FROM soknader
             WHERE ident = ?1 ORDER BY opprettet"
          ))?;
          let soknader = stmt
            .query_map(rusqlite::params![ident_owned], soknad_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

          let mut stmt = conn.prepare(&format!(
            "SELECT {INNSENDING_COLS} FROM innsendinger
             WHERE ident = ?1 ORDER BY innsendt"
          ))?;
          let innsendinger = stmt
            .query_map(rusqlite::params![ident_owned], innsending_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

          Ok((soknader, innsendinger))
        })
        .await?;

    if raw_soknader.is_empty() {
      return Ok(None);
    }

    let soknader = bygg_soknader(raw_soknader, raw_innsendinger)?;
    Ok(Some(Person::rehydrer(ident, soknader)))
  }

  /// Saves under a single transaction. On a version conflict nothing is
  /// written and [`Error::Konflikt`] is returned; the caller must reload
  /// the person before retrying.
  async fn lagre<'a>(&'a self, person: &'a Person) -> Result<()> {
    let mut soknad_rader = Vec::new();
    let mut innsending_rader = Vec::new();

    for soknad in person.soknader() {
      soknad_rader.push(RawSoknad::from_soknad(soknad)?);

      if let Some(primaer) = soknad.innsending() {
        innsending_rader.push(RawInnsending::from_innsending(
          primaer,
          soknad.soknad_id(),
          soknad.ident(),
          None,
        )?);
        for etter in primaer.ettersendinger() {
          innsending_rader.push(RawInnsending::from_innsending(
            etter,
            soknad.soknad_id(),
            soknad.ident(),
            Some(primaer.innsending_id()),
          )?);
        }
      }
    }

    let logg = person.aktivitetslogg();
    let aktivitet_rader = logg
      .aktiviteter()
      .iter()
      .map(|a| {
        Ok((
          encode_alvorlighetsgrad(a.alvorlighetsgrad).to_string(),
          a.melding.clone(),
          encode_dt(a.tidsstempel),
          serde_json::to_string(&a.kontekster)?,
        ))
      })
      .collect::<Result<Vec<_>>>()?;
    let behov_rader = logg
      .behovene()
      .iter()
      .map(|b| {
        Ok((
          b.typ.navn().to_string(),
          serde_json::to_string(&b.detaljer)?,
          serde_json::to_string(&b.kontekster)?,
        ))
      })
      .collect::<Result<Vec<_>>>()?;

    let ident = person.ident().to_string();

    let konflikt: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        for rad in &soknad_rader {
          if rad.versjon == 0 {
            tx.execute(
              "INSERT INTO soknader (
                 soknad_id, ident, tilstand, spraak, opprettet,
                 innsendt_tidspunkt, sist_endret_av_bruker,
                 prosessnavn, prosessversjon,
                 dokumentkrav, behandlede_behov, versjon
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1)",
              rusqlite::params![
                rad.soknad_id,
                rad.ident,
                rad.tilstand,
                rad.spraak,
                rad.opprettet,
                rad.innsendt_tidspunkt,
                rad.sist_endret_av_bruker,
                rad.prosessnavn,
                rad.prosessversjon,
                rad.dokumentkrav,
                rad.behandlede_behov,
              ],
            )?;
          } else {
            let endret = tx.execute(
              "UPDATE soknader SET
                 tilstand = ?2, innsendt_tidspunkt = ?3,
                 sist_endret_av_bruker = ?4,
                 prosessnavn = ?5, prosessversjon = ?6,
                 dokumentkrav = ?7, behandlede_behov = ?8,
                 versjon = versjon + 1
               WHERE soknad_id = ?1 AND versjon = ?9",
              rusqlite::params![
                rad.soknad_id,
                rad.tilstand,
                rad.innsendt_tidspunkt,
                rad.sist_endret_av_bruker,
                rad.prosessnavn,
                rad.prosessversjon,
                rad.dokumentkrav,
                rad.behandlede_behov,
                rad.versjon,
              ],
            )?;
            // Returning without commit rolls the transaction back.
            if endret == 0 {
              return Ok(Some(rad.soknad_id.clone()));
            }
          }

          tx.execute(
            "DELETE FROM innsendinger WHERE soknad_id = ?1",
            rusqlite::params![rad.soknad_id],
          )?;
        }

        for rad in &innsending_rader {
          tx.execute(
            &format!(
              "INSERT INTO innsendinger ({INNSENDING_COLS})
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            rusqlite::params![
              rad.innsending_id,
              rad.soknad_id,
              rad.forelder_id,
              rad.ident,
              rad.innsending_type,
              rad.tilstand,
              rad.innsendt,
              rad.journalpost_id,
              rad.skjemakode,
              rad.hoveddokument,
              rad.dokumenter,
            ],
          )?;
        }

        for (grad, melding, tidsstempel, kontekster) in &aktivitet_rader {
          tx.execute(
            "INSERT INTO aktiviteter
               (ident, alvorlighetsgrad, melding, tidsstempel, kontekster)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![ident, grad, melding, tidsstempel, kontekster],
          )?;
        }
        for (typ, detaljer, kontekster) in &behov_rader {
          tx.execute(
            "INSERT INTO behov (ident, typ, detaljer, kontekster)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![ident, typ, detaljer, kontekster],
          )?;
        }

        tx.commit()?;
        Ok(None)
      })
      .await?;

    match konflikt {
      Some(id) => Err(Error::Konflikt(decode_uuid(&id)?)),
      None => Ok(()),
    }
  }

  async fn hent_paabegynte<'a>(
    &'a self,
    ident: &'a str,
  ) -> Result<Vec<PaabegyntSoknad>> {
    let ident_owned = ident.to_string();

    let rader: Vec<(String, String, String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT soknad_id, opprettet, sist_endret_av_bruker, spraak
           FROM soknader
           WHERE ident = ?1 AND tilstand IN ('UnderOpprettelse', 'Påbegynt')
           ORDER BY opprettet",
        )?;
        let rader = stmt
          .query_map(rusqlite::params![ident_owned], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rader)
      })
      .await?;

    rader
      .into_iter()
      .map(|(id, opprettet, sist_endret, spraak)| {
        Ok(PaabegyntSoknad {
          soknad_id:             decode_uuid(&id)?,
          opprettet:             decode_dt(&opprettet)?,
          sist_endret_av_bruker: decode_dt(&sist_endret)?,
          spraak,
        })
      })
      .collect()
  }

  async fn hent_eier(&self, soknad_id: Uuid) -> Result<Option<String>> {
    let id_str = encode_uuid(soknad_id);

    let eier: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT ident FROM soknader WHERE soknad_id = ?1",
              rusqlite::params![id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(eier)
  }

  async fn slett_paabegynte_eldre_enn(
    &self,
    eldre_enn: DateTime<Utc>,
  ) -> Result<usize> {
    let cutoff = encode_dt(eldre_enn);
    let naa = Utc::now();
    let naa_str = encode_dt(naa);
    let laas_utlopt = encode_dt(naa - janitor_laas_utlop());
    let eier = encode_uuid(Uuid::new_v4());

    let slettet: Option<usize> = self
      .conn
      .call(move |conn| {
        let tatt = conn.execute(
          "UPDATE janitor_laas SET laast_av = ?1, laast_tidspunkt = ?2
           WHERE id = 1 AND (laast_av IS NULL OR laast_tidspunkt < ?3)",
          rusqlite::params![eier, naa_str, laas_utlopt],
        )?;
        if tatt == 0 {
          return Ok(None);
        }

        // FK cascade removes any innsendinger rows.
        let antall = conn.execute(
          "DELETE FROM soknader
           WHERE tilstand IN ('UnderOpprettelse', 'Påbegynt')
             AND opprettet < ?1",
          rusqlite::params![cutoff],
        )?;

        conn.execute(
          "UPDATE janitor_laas SET laast_av = NULL, laast_tidspunkt = NULL
           WHERE id = 1 AND laast_av = ?1",
          rusqlite::params![eier],
        )?;

        Ok(Some(antall))
      })
      .await?;

    match slettet {
      Some(antall) => Ok(antall),
      None => {
        tracing::debug!("janitor lock held elsewhere; skipping purge");
        Ok(0)
      }
    }
  }
}
