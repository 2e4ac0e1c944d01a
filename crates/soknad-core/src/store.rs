//! The `LivssyklusStore` trait — the persistence contract.
//!
//! Implemented by storage backends (e.g. `soknad-store-sqlite`). The
//! mediator and HTTP layer depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{person::Person, projection::PaabegyntSoknad};

/// Abstraction over the aggregate store.
///
/// `lagre` must provide compare-and-swap semantics on each søknad's version
/// counter: of two concurrent writers that loaded the same version, exactly
/// one must fail. Activity-log entries are insert-only.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait LivssyklusStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Load and rehydrate the full aggregate for an ident. Returns `None`
  /// when the person has no søknader.
  fn hent<'a>(
    &'a self,
    ident: &'a str,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + 'a;

  /// Persist the full aggregate: søknad rows, innsending rows, and the
  /// activity-log entries accumulated since the person was loaded.
  fn lagre<'a>(
    &'a self,
    person: &'a Person,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Summaries of the ident's unsubmitted søknader, for the resume flow.
  fn hent_paabegynte<'a>(
    &'a self,
    ident: &'a str,
  ) -> impl Future<Output = Result<Vec<PaabegyntSoknad>, Self::Error>> + Send + 'a;

  /// The owner ident of a søknad, for the authorization check. Returns
  /// `None` if the søknad does not exist.
  fn hent_eier(
    &self,
    soknad_id: Uuid,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  /// Janitor contract: purge søknader still unsubmitted at `eldre_enn`,
  /// under an advisory lock so concurrent instances do not double-purge.
  /// Returns the number of søknader deleted.
  fn slett_paabegynte_eldre_enn(
    &self,
    eldre_enn: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
