//! ircord - Discord <-> IRC chat bridge
//!
//! Relays messages, edits, attachments and membership notices between one
//! IRC channel and one Discord channel (plus its threads).

mod bridge;
mod common;
mod config;
mod discord;
mod ircnet;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{debug, error, info, warn};

use bridge::{Bridge, ChannelBundle};
use config::{env::get_config_path, load_and_validate};
use discord::DiscordBot;
use ircnet::IrcConnection;

/// Upper bound on waiting for the farewell and queued IRC lines at exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("ircord v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  IRC: {}:{} as {}", config.irc_server, config.irc_port, config.irc_user);
    info!("  IRC channel: {}", config.irc_channel);
    info!("  Discord channel: {}", config.discord_bridge_channel);

    let channels = ChannelBundle::new();

    info!("Starting Discord bot...");
    let discord_bot = DiscordBot::build(
        &config.discord_token,
        channels.senders.discord_tx.clone(),
        channels.shutdown_receiver(),
    )
    .await?;
    let discord_service = Arc::new(discord_bot.service());

    // A failed IRC connection is fatal; there is no reconnect loop.
    let (irc_connection, irc_sender) = IrcConnection::connect(
        &config,
        channels.senders.irc_tx.clone(),
        channels.shutdown_receiver(),
    )
    .await?;

    let bridge = Bridge::new(config, discord_service, Arc::new(irc_sender));

    let shutdown_tx = channels.control.shutdown_tx;
    let mut bridge_task = tokio::spawn(bridge.run(
        channels.bridge.events_rx,
        channels.bridge.shutdown_rx,
    ));
    let mut irc_task = tokio::spawn(irc_connection.run());
    let mut discord_task = tokio::spawn(discord_bot.run());

    info!("running");

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - saying goodbye...");
            true
        }
        result = &mut irc_task => {
            log_task_exit("IRC", result);
            false
        }
        result = &mut discord_task => {
            log_task_exit("Discord", result);
            false
        }
        _ = &mut bridge_task => false,
    };

    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (tasks already exited): {}", e);
        }
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut bridge_task).await {
            Ok(Ok(())) => debug!("Bridge finished"),
            Ok(Err(e)) => warn!("Bridge task panicked: {}", e),
            Err(_) => warn!("Farewell timed out"),
        }
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut irc_task).await.is_err() {
            warn!("IRC flush timed out");
        }
    }

    info!("Exiting...");
    Ok(())
}

fn log_task_exit(name: &str, result: Result<Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => warn!("{} connection ended", name),
        Ok(Err(e)) => error!("{} connection failed: {:#}", name, e),
        Err(e) => error!("{} task panicked: {}", name, e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
