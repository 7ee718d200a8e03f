//! glisten daemon
//!
//! Receives webhooks over HTTP and streams each event to every connected
//! SSH terminal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glisten_core::config::{self, GlistenConfig};
use glisten_server::auth::hash_password;
use glisten_server::server::{load_or_generate_host_key, SshServer};
use glisten_server::{http, GlistenState};

#[derive(Parser)]
#[command(name = "glisten")]
#[command(about = "Stream webhook events to SSH sessions")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SSH bind address (overrides config)
    #[arg(long)]
    ssh_bind: Option<String>,

    /// HTTP bind address (overrides config)
    #[arg(long)]
    http_bind: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write a default configuration file (to --config or the default
    /// path) and exit
    #[arg(long)]
    init_config: bool,

    /// Print the account entry for a password and exit
    #[arg(long, value_name = "PASSWORD")]
    hash_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(password) = &args.hash_password {
        println!("{}", hash_password(password));
        return Ok(());
    }

    if args.init_config {
        let path = args.config.clone().unwrap_or_else(config::default_config_path);
        config::write_default_config(&path)
            .with_context(|| format!("Failed to write config to {:?}", path))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("glisten starting...");

    let config = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                GlistenConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            GlistenConfig::default()
        }
    };
    config.validate().context("Invalid configuration")?;

    let ssh_bind = args.ssh_bind.unwrap_or_else(|| config.ssh_bind_address.clone());
    let http_bind = args.http_bind.unwrap_or_else(|| config.http_bind_address.clone());

    tracing::info!(
        "Read mode: {}, session mode: {}, event field: {:?}",
        config.read_mode,
        config.session_mode,
        config.event_field
    );

    let host_key = load_or_generate_host_key(&config.host_key_path).await?;
    if let Ok(public) = host_key.clone_public_key() {
        tracing::info!("Host key fingerprint: {}", public.fingerprint());
    }

    let state = Arc::new(GlistenState::new(config)?);

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let http_state = Arc::clone(&state);
    let http_cancel = cancel.clone();
    let http_task = tokio::spawn(async move {
        let result = http::serve(&http_bind, http_state, http_cancel.clone()).await;
        // A dead ingress makes the daemon useless; take SSH down with it
        http_cancel.cancel();
        result
    });

    let server = SshServer::new(host_key, Arc::clone(&state), cancel.clone());
    let ssh_result = server.run(&ssh_bind).await;
    cancel.cancel();

    let http_result = http_task.await.context("HTTP server task panicked")?;
    ssh_result?;
    http_result?;

    tracing::info!("glisten shutdown complete");
    Ok(())
}

/// Cancel the token on Ctrl+C or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel.cancel();
    });
}
