//! Handlers for the `/soknad` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/soknad` | Start a new søknad |
//! | `GET`    | `/soknad/{id}/data` | Søknad payload for the form client |
//! | `PUT`    | `/soknad/{id}/faktum/{faktum_id}` | User answered a faktum |
//! | `PUT`    | `/soknad/{id}/dokumentkrav/{krav_id}/svar` | Answer a krav |
//! | `PUT`    | `/soknad/{id}/ferdigstill` | Submit |
//! | `PUT`    | `/soknad/{id}/ettersend` | Follow-up submission |
//! | `DELETE` | `/soknad/{id}` | Only valid before submission |
//! | `GET`    | `/soknad/{id}/status` | Lifecycle status |
//! | `GET`    | `/soknad/mine-soknader?fom=` | Resume + history listing |
//!
//! All handlers authenticate the bearer token, and every `{id}` route
//! checks that the token's pid owns the søknad before dispatching.

use axum::{
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
  Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use soknad_core::{
  dokumentkrav::Svar,
  hendelse::{
    DokumentkravSvarHendelse, EttersendingHendelse, FaktumOppdatertHendelse,
    OnskeOmNySoknadHendelse, SlettSoknadHendelse, SoknadInnsendtHendelse,
  },
  projection::{self, MineSoknader, SoknadStatus},
  store::LivssyklusStore,
};
use soknad_rapid::RapidPublisher;
use uuid::Uuid;

use crate::{auth, error::ApiError, AppState};

// ─── Start ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NySoknadBody {
  #[serde(rename = "språk", default = "standard_spraak")]
  pub spraak:      String,
  #[serde(default = "standard_prosessnavn")]
  pub prosessnavn: String,
}

fn standard_spraak() -> String { "NB".to_string() }

fn standard_prosessnavn() -> String { "Dagpenger".to_string() }

#[derive(Debug, Serialize)]
pub struct NySoknadSvar {
  #[serde(rename = "søknad_uuid")]
  pub soknad_id: Uuid,
}

/// `POST /soknad`
pub async fn start<S, R>(
  State(state): State<AppState<S, R>>,
  headers: HeaderMap,
  Json(body): Json<NySoknadBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  let pid = auth::verifiser(&headers, &state.auth)?;

  let hendelse =
    OnskeOmNySoknadHendelse::ny(&pid, &body.spraak, &body.prosessnavn);
  let soknad_id = state.mediator.behandle_onske(hendelse).await?;

  Ok((StatusCode::CREATED, Json(NySoknadSvar { soknad_id })))
}

// ─── Data ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SoknadData {
  #[serde(rename = "søknad_uuid")]
  pub soknad_id:             Uuid,
  pub tilstand:              &'static str,
  #[serde(rename = "språk")]
  pub spraak:                String,
  pub opprettet:             DateTime<Utc>,
  pub sist_endret_av_bruker: DateTime<Utc>,
  pub dokumentkrav:          Vec<soknad_core::dokumentkrav::Krav>,
}

/// `GET /soknad/{id}/data` — the søknad's own payload. Faktum contents live
/// in the form engine; this side only owns lifecycle and dokumentkrav.
pub async fn data<S, R>(
  State(state): State<AppState<S, R>>,
  headers: HeaderMap,
  Path(soknad_id): Path<Uuid>,
) -> Result<Json<SoknadData>, ApiError>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  let pid = sjekk_eier(&state, &headers, soknad_id).await?;

  let person = state
    .mediator
    .hent_person(&pid)
    .await?
    .ok_or_else(|| ApiError::IkkeFunnet(format!("søknad {soknad_id}")))?;
  let soknad = person
    .soknader()
    .iter()
    .find(|s| s.soknad_id() == soknad_id)
    .ok_or_else(|| ApiError::IkkeFunnet(format!("søknad {soknad_id}")))?;

  Ok(Json(SoknadData {
    soknad_id,
    tilstand: soknad.tilstand().navn(),
    spraak: soknad.spraak().to_string(),
    opprettet: soknad.opprettet(),
    sist_endret_av_bruker: soknad.sist_endret_av_bruker(),
    dokumentkrav: soknad.dokumentkrav().krav().to_vec(),
  }))
}

// ─── Faktum ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FaktumSvar {
  pub sist_endret_av_bruker: DateTime<Utc>,
}

/// `PUT /soknad/{id}/faktum/{faktum_id}`
pub async fn faktum<S, R>(
  State(state): State<AppState<S, R>>,
  headers: HeaderMap,
  Path((soknad_id, faktum_id)): Path<(Uuid, String)>,
) -> Result<Json<FaktumSvar>, ApiError>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  let pid = sjekk_eier(&state, &headers, soknad_id).await?;

  let hendelse = FaktumOppdatertHendelse::ny(&pid, soknad_id, &faktum_id);
  let tidspunkt = hendelse.tidspunkt;
  state.mediator.behandle_faktum_oppdatert(hendelse).await?;

  Ok(Json(FaktumSvar {
    sist_endret_av_bruker: tidspunkt,
  }))
}

// ─── Dokumentkrav ────────────────────────────────────────────────────────────

/// `PUT /soknad/{id}/dokumentkrav/{krav_id}/svar`
pub async fn dokumentkrav_svar<S, R>(
  State(state): State<AppState<S, R>>,
  headers: HeaderMap,
  Path((soknad_id, krav_id)): Path<(Uuid, String)>,
  Json(svar): Json<Svar>,
) -> Result<StatusCode, ApiError>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  let pid = sjekk_eier(&state, &headers, soknad_id).await?;

  let hendelse = DokumentkravSvarHendelse::ny(&pid, soknad_id, &krav_id, svar);
  state.mediator.behandle_dokumentkrav_svar(hendelse).await?;

  Ok(StatusCode::NO_CONTENT)
}

// ─── Submit / ettersend / delete ─────────────────────────────────────────────

/// `PUT /soknad/{id}/ferdigstill`
pub async fn ferdigstill<S, R>(
  State(state): State<AppState<S, R>>,
  headers: HeaderMap,
  Path(soknad_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  let pid = sjekk_eier(&state, &headers, soknad_id).await?;

  let hendelse = SoknadInnsendtHendelse::ny(&pid, soknad_id);
  state.mediator.behandle_innsendt(hendelse).await?;

  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct EttersendingSvar {
  #[serde(rename = "innsendingId")]
  pub innsending_id: Uuid,
}

/// `PUT /soknad/{id}/ettersend`
pub async fn ettersend<S, R>(
  State(state): State<AppState<S, R>>,
  headers: HeaderMap,
  Path(soknad_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  let pid = sjekk_eier(&state, &headers, soknad_id).await?;

  let hendelse = EttersendingHendelse::ny(&pid, soknad_id);
  let innsending_id = state.mediator.behandle_ettersending(hendelse).await?;

  Ok((StatusCode::CREATED, Json(EttersendingSvar { innsending_id })))
}

/// `DELETE /soknad/{id}`
pub async fn slett<S, R>(
  State(state): State<AppState<S, R>>,
  headers: HeaderMap,
  Path(soknad_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  let pid = sjekk_eier(&state, &headers, soknad_id).await?;

  let hendelse = SlettSoknadHendelse::ny(&pid, soknad_id);
  state.mediator.behandle_slett(hendelse).await?;

  Ok(StatusCode::NO_CONTENT)
}

// ─── Status / listing ────────────────────────────────────────────────────────

/// `GET /soknad/{id}/status`
pub async fn status<S, R>(
  State(state): State<AppState<S, R>>,
  headers: HeaderMap,
  Path(soknad_id): Path<Uuid>,
) -> Result<Json<SoknadStatus>, ApiError>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  let pid = sjekk_eier(&state, &headers, soknad_id).await?;

  let person = state
    .mediator
    .hent_person(&pid)
    .await?
    .ok_or_else(|| ApiError::IkkeFunnet(format!("søknad {soknad_id}")))?;

  projection::status(&person, soknad_id)
    .map(Json)
    .ok_or_else(|| ApiError::IkkeFunnet(format!("søknad {soknad_id}")))
}

#[derive(Debug, Deserialize)]
pub struct MineSoknaderParams {
  /// Include submitted søknader from this date onwards.
  pub fom: Option<NaiveDate>,
}

/// `GET /soknad/mine-soknader?fom=`
pub async fn mine_soknader<S, R>(
  State(state): State<AppState<S, R>>,
  headers: HeaderMap,
  Query(params): Query<MineSoknaderParams>,
) -> Result<Json<MineSoknader>, ApiError>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  let pid = auth::verifiser(&headers, &state.auth)?;

  let fom = params
    .fom
    .and_then(|dato| dato.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc());

  let listing = match state.mediator.hent_person(&pid).await? {
    Some(person) => projection::mine_soknader(&person, fom),
    None => MineSoknader {
      paabegynt: None,
      innsendte: Vec::new(),
    },
  };

  Ok(Json(listing))
}

// ─── Owner check ─────────────────────────────────────────────────────────────

/// Authenticate, then require that the pid owns `soknad_id`. Returns the
/// pid. Unknown søknader give 404, foreign ones 403.
async fn sjekk_eier<S, R>(
  state: &AppState<S, R>,
  headers: &HeaderMap,
  soknad_id: Uuid,
) -> Result<String, ApiError>
where
  S: LivssyklusStore,
  R: RapidPublisher,
{
  let pid = auth::verifiser(headers, &state.auth)?;

  let eier = state
    .mediator
    .hent_eier(soknad_id)
    .await?
    .ok_or_else(|| ApiError::IkkeFunnet(format!("søknad {soknad_id}")))?;

  if eier != pid {
    return Err(ApiError::IkkeEier);
  }
  Ok(pid)
}
