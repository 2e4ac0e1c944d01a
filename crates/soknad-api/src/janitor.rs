//! Background purge of abandoned søknader.
//!
//! Runs on a fixed interval; the store takes a single-row advisory lock so
//! only one instance purges per tick even when several replicas run.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use soknad_core::store::LivssyklusStore;
use tokio::task::JoinHandle;

pub fn start<S>(
  store: Arc<S>,
  intervall: Duration,
  retensjon_dager: i64,
) -> JoinHandle<()>
where
  S: LivssyklusStore + 'static,
{
  tokio::spawn(async move {
    let mut tikker = tokio::time::interval(intervall);
    // The first tick fires immediately; consume it before the loop.
    tikker.tick().await;

    loop {
      tikker.tick().await;
      let eldre_enn = Utc::now() - chrono::Duration::days(retensjon_dager);

      match store.slett_paabegynte_eldre_enn(eldre_enn).await {
        Ok(0) => tracing::debug!("janitor: nothing to purge"),
        Ok(antall) => {
          tracing::info!(antall, retensjon_dager, "janitor purged søknader");
        }
        Err(feil) => tracing::warn!(%feil, "janitor purge failed"),
      }
    }
  })
}
