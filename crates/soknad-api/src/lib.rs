//! HTTP surface for the søknad lifecycle service.
//!
//! Exposes an axum [`Router`] backed by any
//! [`soknad_core::store::LivssyklusStore`] and any
//! [`soknad_rapid::RapidPublisher`]. Handlers never touch the aggregate
//! directly — every mutation goes through the [`mediator::SoknadMediator`].

pub mod auth;
pub mod error;
pub mod janitor;
pub mod mediator;
pub mod routes;

pub use error::ApiError;
pub use mediator::SoknadMediator;

use std::{path::PathBuf, sync::Arc};

use axum::{
  routing::{delete, get, post, put},
  Router,
};
use serde::Deserialize;
use soknad_core::store::LivssyklusStore;
use soknad_rapid::RapidPublisher;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` / env.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub jwt_secret: String,

  #[serde(default = "standard_janitor_intervall_sekunder")]
  pub janitor_intervall_sekunder: u64,
  /// Påbegynte søknader older than this are purged.
  #[serde(default = "standard_retensjon_dager")]
  pub retensjon_dager:            i64,
  /// Offset stamped as `forventetFerdig` on innsending state events.
  #[serde(default = "standard_forventet_ferdig_timer")]
  pub forventet_ferdig_timer:     i64,
}

fn standard_janitor_intervall_sekunder() -> u64 { 3600 }

fn standard_retensjon_dager() -> i64 { 7 }

fn standard_forventet_ferdig_timer() -> i64 { 1 }

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, R> {
  pub mediator: Arc<SoknadMediator<S, R>>,
  pub auth:     Arc<AuthConfig>,
}

impl<S, R> Clone for AppState<S, R> {
  fn clone(&self) -> Self {
    Self {
      mediator: Arc::clone(&self.mediator),
      auth:     Arc::clone(&self.auth),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full `/soknad` router.
pub fn router<S, R>(state: AppState<S, R>) -> Router
where
  S: LivssyklusStore + 'static,
  R: RapidPublisher + 'static,
{
  Router::new()
    .route("/soknad", post(routes::start::<S, R>))
    .route("/soknad/mine-soknader", get(routes::mine_soknader::<S, R>))
    .route("/soknad/{id}", delete(routes::slett::<S, R>))
    .route("/soknad/{id}/data", get(routes::data::<S, R>))
    .route("/soknad/{id}/status", get(routes::status::<S, R>))
    .route("/soknad/{id}/faktum/{faktum_id}", put(routes::faktum::<S, R>))
    .route(
      "/soknad/{id}/dokumentkrav/{krav_id}/svar",
      put(routes::dokumentkrav_svar::<S, R>),
    )
    .route("/soknad/{id}/ferdigstill", put(routes::ferdigstill::<S, R>))
    .route("/soknad/{id}/ettersend", put(routes::ettersend::<S, R>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{header, Request, StatusCode},
  };
  use chrono::Utc;
  use jsonwebtoken::{encode, EncodingKey, Header};
  use serde_json::{json, Value};
  use soknad_core::{
    hendelse::{
      ArkiverbarSoknadMottattHendelse, JournalfortHendelse,
      MidlertidigJournalfortHendelse, SoknadOpprettetHendelse,
    },
    innsending::{Dokument, Dokumentvariant},
    soknad::Prosessversjon,
  };
  use soknad_rapid::{mottak::MottattHendelse, InMemoryRapid, MottakSentral};
  use soknad_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  const HEMMELIGHET: &str = "test-hemmelighet";
  const IDENT: &str = "12345678912";

  type TestMediator = SoknadMediator<SqliteStore, InMemoryRapid>;

  async fn app() -> (Router, Arc<TestMediator>, Arc<InMemoryRapid>) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let rapid = Arc::new(InMemoryRapid::ny());
    let mediator = Arc::new(SoknadMediator::ny(
      store,
      Arc::clone(&rapid),
      chrono::Duration::hours(1),
    ));
    let state = AppState {
      mediator: Arc::clone(&mediator),
      auth:     Arc::new(AuthConfig::ny(HEMMELIGHET)),
    };
    (router(state), mediator, rapid)
  }

  fn token(pid: &str) -> String {
    let claims = auth::Claims {
      pid: pid.to_string(),
      exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
      &Header::default(),
      &claims,
      &EncodingKey::from_secret(HEMMELIGHET.as_bytes()),
    )
    .unwrap()
  }

  fn request(method: &str, uri: &str, pid: Option<&str>) -> Request<Body> {
    let mut bygger = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(pid) = pid {
      bygger =
        bygger.header(header::AUTHORIZATION, format!("Bearer {}", token(pid)));
    }
    bygger.body(Body::from("{}")).unwrap()
  }

  async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn start_soknad(app: &Router, pid: &str) -> Uuid {
    let response = app
      .clone()
      .oneshot(request("POST", "/soknad", Some(pid)))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    body["søknad_uuid"].as_str().unwrap().parse().unwrap()
  }

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

  /// Answer the NySøknad behov so the søknad reaches Påbegynt.
  async fn opprett(mediator: &TestMediator, pid: &str, soknad_id: Uuid) {
    let hendelse = SoknadOpprettetHendelse::ny(
      pid,
      soknad_id,
      Uuid::new_v4(),
      Prosessversjon {
        navn:    "Dagpenger".to_string(),
        versjon: 42,
      },
    );
    mediator
      .behandle_mottatt(MottattHendelse::Opprettet(hendelse))
      .await
      .unwrap();
  }

  /// Drive a submitted søknad through arkiverbar + journalføring.
  async fn journalfor(mediator: &TestMediator, pid: &str, soknad_id: Uuid) {
    let innsending_id = mediator
      .hent_person(pid)
      .await
      .unwrap()
      .unwrap()
      .soknader()[0]
      .innsending()
      .unwrap()
      .innsending_id();

    mediator
      .behandle_mottatt(MottattHendelse::Arkiverbar(
        ArkiverbarSoknadMottattHendelse::ny(
          pid,
          soknad_id,
          innsending_id,
          Uuid::new_v4(),
          dokument(),
        ),
      ))
      .await
      .unwrap();
    mediator
      .behandle_mottatt(MottattHendelse::MidlertidigJournalfort(
        MidlertidigJournalfortHendelse::ny(
          pid,
          soknad_id,
          innsending_id,
          Uuid::new_v4(),
          "J123",
        ),
      ))
      .await
      .unwrap();
    mediator
      .behandle_mottatt(MottattHendelse::Journalfort(JournalfortHendelse::ny(
        pid, "J123",
      )))
      .await
      .unwrap();
  }

  // ── Auth ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_token_gives_401() {
    let (app, _, _) = app().await;
    let response = app
      .oneshot(request("POST", "/soknad", None))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let problem = body_json(response).await;
    assert_eq!(problem["type"], "urn:soknad:feil:ikke-autentisert");
  }

  #[tokio::test]
  async fn foreign_pid_gives_403_regardless_of_state() {
    let (app, _, _) = app().await;
    let soknad_id = start_soknad(&app, IDENT).await;

    let response = app
      .oneshot(request(
        "GET",
        &format!("/soknad/{soknad_id}/status"),
        Some("99999999999"),
      ))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let problem = body_json(response).await;
    assert_eq!(problem["type"], "urn:soknad:feil:ikke-eier");
  }

  // ── Lifecycle over HTTP ───────────────────────────────────────────────

  #[tokio::test]
  async fn start_soknad_emits_ny_soknad_behov() {
    let (app, _, rapid) = app().await;
    start_soknad(&app, IDENT).await;

    let names = rapid.event_names();
    assert_eq!(names, vec!["behov"]);
    let (_, behov) = rapid.meldinger().into_iter().next().unwrap();
    assert_eq!(behov["@behov"], json!(["NySøknad"]));
  }

  #[tokio::test]
  async fn second_start_while_paabegynt_gives_409() {
    let (app, mediator, _) = app().await;
    let soknad_id = start_soknad(&app, IDENT).await;
    opprett(&mediator, IDENT, soknad_id).await;

    let response = app
      .oneshot(request("POST", "/soknad", Some(IDENT)))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn ferdigstill_then_status_reaches_journalfort() {
    let (app, mediator, rapid) = app().await;
    let soknad_id = start_soknad(&app, IDENT).await;
    opprett(&mediator, IDENT, soknad_id).await;

    let response = app
      .clone()
      .oneshot(request(
        "PUT",
        &format!("/soknad/{soknad_id}/ferdigstill"),
        Some(IDENT),
      ))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(rapid
      .event_names()
      .iter()
      .any(|navn| navn == "søknad_innsendt"));

    journalfor(&mediator, IDENT, soknad_id).await;

    let response = app
      .oneshot(request(
        "GET",
        &format!("/soknad/{soknad_id}/status"),
        Some(IDENT),
      ))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = body_json(response).await;
    assert_eq!(status["tilstand"], "Journalført");
    assert_eq!(status["journalpost_id"], "J123");
  }

  #[tokio::test]
  async fn delete_journalfort_soknad_gives_409() {
    let (app, mediator, _) = app().await;
    let soknad_id = start_soknad(&app, IDENT).await;
    opprett(&mediator, IDENT, soknad_id).await;

    app
      .clone()
      .oneshot(request(
        "PUT",
        &format!("/soknad/{soknad_id}/ferdigstill"),
        Some(IDENT),
      ))
      .await
      .unwrap();
    journalfor(&mediator, IDENT, soknad_id).await;

    let response = app
      .oneshot(request(
        "DELETE",
        &format!("/soknad/{soknad_id}"),
        Some(IDENT),
      ))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let problem = body_json(response).await;
    assert_eq!(problem["type"], "urn:soknad:feil:ugyldig-tilstand");
  }

  #[tokio::test]
  async fn delete_paabegynt_soknad_gives_204() {
    let (app, mediator, _) = app().await;
    let soknad_id = start_soknad(&app, IDENT).await;
    opprett(&mediator, IDENT, soknad_id).await;

    let response = app
      .oneshot(request(
        "DELETE",
        &format!("/soknad/{soknad_id}"),
        Some(IDENT),
      ))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
  }

  #[tokio::test]
  async fn unknown_soknad_gives_404() {
    let (app, _, _) = app().await;
    let response = app
      .oneshot(request(
        "GET",
        &format!("/soknad/{}/status", Uuid::new_v4()),
        Some(IDENT),
      ))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn mine_soknader_lists_the_paabegynte() {
    let (app, mediator, _) = app().await;
    let soknad_id = start_soknad(&app, IDENT).await;
    opprett(&mediator, IDENT, soknad_id).await;

    let response = app
      .oneshot(request("GET", "/soknad/mine-soknader", Some(IDENT)))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let listing = body_json(response).await;
    assert_eq!(
      listing["paabegynt"]["soknad_id"].as_str().unwrap(),
      soknad_id.to_string()
    );
    assert!(listing["innsendte"].as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn melding_for_unknown_person_is_swallowed() {
    // Bus boundary: a journalført melding with no matching person must not
    // surface an error or publish anything.
    let (_, mediator, rapid) = app().await;
    let sentral = MottakSentral::ny();
    let melding = json!({
      "@event_name": "journalført",
      "journalpostId": "J999",
      "ident":         IDENT,
    });

    mediator.motta_melding(&sentral, &melding.to_string()).await;
    assert!(rapid.meldinger().is_empty());
  }

  #[tokio::test]
  async fn faktum_update_after_submit_gives_409() {
    let (app, mediator, _) = app().await;
    let soknad_id = start_soknad(&app, IDENT).await;
    opprett(&mediator, IDENT, soknad_id).await;

    app
      .clone()
      .oneshot(request(
        "PUT",
        &format!("/soknad/{soknad_id}/ferdigstill"),
        Some(IDENT),
      ))
      .await
      .unwrap();

    let response = app
      .oneshot(request(
        "PUT",
        &format!("/soknad/{soknad_id}/faktum/f1"),
        Some(IDENT),
      ))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
  }
}
