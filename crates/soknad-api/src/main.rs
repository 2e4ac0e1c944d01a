//! soknad-api server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, starts the janitor, and serves the søknad API
//! over HTTP. Outbound rapid traffic goes to [`LoggingRapid`]; wire a real
//! producer in by swapping the publisher.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use soknad_api::{auth::AuthConfig, AppState, ServerConfig, SoknadMediator};
use soknad_rapid::LoggingRapid;
use soknad_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Søknad lifecycle API")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SOKNAD"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  // Purge abandoned søknader in the background.
  let _janitor = soknad_api::janitor::start(
    Arc::clone(&store),
    std::time::Duration::from_secs(server_cfg.janitor_intervall_sekunder),
    server_cfg.retensjon_dager,
  );

  // Build application state.
  let mediator = SoknadMediator::ny(
    Arc::clone(&store),
    Arc::new(LoggingRapid),
    chrono::Duration::hours(server_cfg.forventet_ferdig_timer),
  );
  let state = AppState {
    mediator: Arc::new(mediator),
    auth:     Arc::new(AuthConfig::ny(&server_cfg.jwt_secret)),
  };

  let app = soknad_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
