//! Backend entry-point: configuration, adapters, sweeper, HTTP server.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use backend::inbound::http::AppState;
use backend::outbound::{HttpDocumentStore, SmtpMailer};
use backend::server::{create_server, AppConfig};
use backend::sweeper;

#[derive(Parser, Debug)]
#[command(about = "Bookkeeping REST backend")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = Args::parse();
    // A broken configuration is fatal; a missing file has been replaced
    // with defaults by the loader.
    let config = AppConfig::load(&args.config)
        .map_err(|err| std::io::Error::other(format!("configuration error: {err}")))?;

    let store = Arc::new(HttpDocumentStore::new(&config.db));
    let mailer = Arc::new(
        SmtpMailer::new(&config.mail)
            .map_err(|err| std::io::Error::other(format!("mail configuration error: {err}")))?,
    );

    tokio::fs::create_dir_all(&config.web.cache_dir).await?;
    sweeper::spawn(config.web.cache_dir.clone());

    let state = AppState::new(store, mailer, config);
    create_server(state)?.await
}
