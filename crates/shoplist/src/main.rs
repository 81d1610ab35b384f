//! Shoplist - group shopping list bot
//!
//! Binary name: `shoplist`

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::{path::PathBuf, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use shoplist_core::{
    ClockIdGenerator, Dispatcher, DispatcherOptions, LedgerBackend, LedgerStore, MemoryBackend,
    RowCodec, SchemaStatus, SessionStore, SystemClock,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

mod config;
mod google_auth;
mod poller;
mod sheets;
mod telegram;

use config::{BackendKind, Config};
use google_auth::{ServiceAccountKey, TokenSource};
use poller::PollOptions;
use sheets::SheetsBackend;
use telegram::TelegramClient;

const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Group shopping list bot for Telegram, backed by a Google Sheets ledger
#[derive(Debug, Parser)]
#[command(name = "shoplist", version, about)]
struct Cli {
    /// Config file (default: <config dir>/shoplist/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Validate configuration and ledger schema, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Error: {err:#}");
        }
        #[allow(clippy::exit)]
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref()).context("invalid configuration")?;
    let backend = build_backend(&config).await?;

    let ledger = Arc::new(
        LedgerStore::new(
            backend,
            Arc::new(ClockIdGenerator::new()),
            Arc::new(SystemClock),
            RowCodec::new(config.ledger.timestamp_format.clone()),
        )
        .with_drift_policy(config.ledger.schema_drift)
        .with_call_timeout(config.remote_timeout()),
    );
    match ledger.ensure_schema().await.context("ledger schema check failed")? {
        SchemaStatus::Intact => info!("ledger schema ok"),
        SchemaStatus::Initialized => info!("ledger initialized"),
        SchemaStatus::Reset { discarded_rows } => {
            warn!(discarded_rows, "ledger was reset, previous rows are gone");
        }
    }

    let poll_timeout = Duration::from_secs(config.telegram.poll_timeout_secs);
    let telegram = Arc::new(
        TelegramClient::new(&config.telegram.token, poll_timeout)
            .context("failed to set up telegram client")?,
    );
    let profile = telegram
        .profile()
        .await
        .context("telegram rejected the bot token")?;
    info!(
        bot = ?profile.username,
        reads_all_group_messages = profile.can_read_all_group_messages,
        "connected to telegram"
    );
    if !profile.can_read_all_group_messages {
        warn!(
            "privacy mode is on: in groups only commands and replies to the bot arrive, \
             so menu keyboard taps are lost; use /add and /list or disable privacy mode"
        );
    }

    if cli.check {
        info!("configuration, ledger and bot token look good");
        return Ok(());
    }

    let dispatcher = Arc::new(Dispatcher::new(
        ledger,
        Arc::new(SessionStore::new(config.session_ttl())),
        telegram.clone(),
        config.access_policy(),
        DispatcherOptions {
            projection: config.projection(),
        },
    ));

    let (stop_tx, stop_rx) = broadcast::channel(1);
    let poll = tokio::spawn(poller::run(
        telegram,
        dispatcher,
        PollOptions {
            bot_username: profile.username,
            grace_period: GRACE_PERIOD,
        },
        stop_rx,
    ));

    shutdown_signal().await?;
    let _ = stop_tx.send(());
    poll.await.context("poll loop terminated abnormally")?;
    info!("shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C, or on SIGTERM where there is one
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for Ctrl-C")?;
                info!("received SIGINT, stopping");
            }
            _ = sigterm.recv() => info!("received SIGTERM, stopping"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        info!("received Ctrl-C, stopping");
    }
    Ok(())
}

async fn build_backend(config: &Config) -> Result<Arc<dyn LedgerBackend>> {
    match config.ledger.backend {
        BackendKind::Memory => {
            warn!("using in-memory ledger, items are lost on exit");
            Ok(Arc::new(MemoryBackend::new()))
        }
        BackendKind::Sheets => {
            let key = match (&config.google.credentials_json, &config.google.credentials_file) {
                (Some(json), _) => ServiceAccountKey::from_json(json),
                (None, Some(path)) => ServiceAccountKey::from_file(path),
                (None, None) => anyhow::bail!("google credentials are not configured"),
            }
            .context("failed to load google service account key")?;

            let timeout = config.remote_timeout();
            let http = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("failed to build http client")?;
            let tokens = TokenSource::new(key, http).context("invalid google private key")?;
            let sheets = SheetsBackend::new(
                tokens,
                config.ledger.spreadsheet_id.clone(),
                config.ledger.sheet_name.clone(),
                timeout,
            )?;
            sheets
                .ensure_tab()
                .await
                .context("failed to open the ledger tab")?;
            Ok(Arc::new(sheets))
        }
    }
}
