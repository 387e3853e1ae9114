//! IRC connection built on the `irc` crate.
//!
//! [`IrcConnection`] owns the read side and drives the protocol handler;
//! [`IrcSender`] is the cloneable write side handed to the bridge.

use std::pin::Pin;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use irc::client::prelude::{Client, Command, Config as IrcConfig};
use irc::client::Sender;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::common::error::IrcResult;
use crate::common::{BridgeEvent, IrcEvent};
use crate::config::Config;
use crate::ircnet::handler::IrcHandler;
use crate::ircnet::service::IrcService;

/// How long the stream keeps being polled after shutdown so queued lines flush.
const SHUTDOWN_FLUSH_GRACE: Duration = Duration::from_secs(2);

/// Map bridge settings onto the `irc` crate's client config.
pub fn client_config(config: &Config) -> IrcConfig {
    IrcConfig {
        nickname: Some(config.irc_user.clone()),
        username: Some(config.irc_user.clone()),
        realname: Some(config.irc_user.clone()),
        server: Some(config.irc_server.clone()),
        port: Some(config.irc_port),
        use_tls: Some(config.irc_tls),
        ..IrcConfig::default()
    }
}

/// Write side of the IRC connection.
#[derive(Clone)]
pub struct IrcSender {
    sender: Sender,
}

impl IrcService for IrcSender {
    fn privmsg(&self, target: &str, text: &str) -> IrcResult<()> {
        self.sender
            .send(Command::PRIVMSG(target.to_string(), text.to_string()))?;
        Ok(())
    }

    fn join(&self, channel: &str, key: Option<&str>) -> IrcResult<()> {
        self.sender
            .send(Command::JOIN(channel.to_string(), key.map(String::from), None))?;
        Ok(())
    }

    fn names(&self, channel: &str) -> IrcResult<()> {
        self.sender
            .send(Command::NAMES(Some(channel.to_string()), None))?;
        Ok(())
    }
}

/// Read side of the IRC connection.
pub struct IrcConnection {
    client: Client,
    handler: IrcHandler,
    events_tx: mpsc::UnboundedSender<BridgeEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl IrcConnection {
    /// Open the TCP/TLS connection. Registration starts in [`IrcConnection::run`].
    pub async fn connect(
        config: &Config,
        events_tx: mpsc::UnboundedSender<BridgeEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(Self, IrcSender)> {
        info!(
            "Connecting to IRC server at {}:{} (tls: {})",
            config.irc_server, config.irc_port, config.irc_tls
        );

        let client = Client::from_config(client_config(config)).await?;
        let sender = IrcSender {
            sender: client.sender(),
        };

        Ok((
            Self {
                client,
                handler: IrcHandler::new(&config.irc_user, &config.irc_password),
                events_tx,
                shutdown_rx,
            },
            sender,
        ))
    }

    /// Register and pump inbound messages until the server closes the
    /// connection or shutdown is requested.
    pub async fn run(mut self) -> Result<()> {
        let mut stream = self.client.stream()?;

        for command in self.handler.start() {
            self.client.send(command)?;
        }

        let mut flush_deadline: Option<Pin<Box<tokio::time::Sleep>>> = None;

        loop {
            tokio::select! {
                message = stream.next() => {
                    match message {
                        Some(Ok(message)) => {
                            let output = self.handler.handle(&message);
                            for reply in output.replies {
                                self.client.send(reply)?;
                            }
                            for event in output.events {
                                self.forward(event);
                            }
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            info!("IRC server closed the connection");
                            return Ok(());
                        }
                    }
                }

                _ = self.shutdown_rx.changed(), if flush_deadline.is_none() => {
                    if *self.shutdown_rx.borrow() {
                        debug!("IRC shutdown requested, flushing outgoing lines");
                        flush_deadline = Some(Box::pin(tokio::time::sleep(SHUTDOWN_FLUSH_GRACE)));
                    }
                }

                _ = async { flush_deadline.as_mut().unwrap().as_mut().await },
                    if flush_deadline.is_some() => {
                    return Ok(());
                }
            }
        }
    }

    fn forward(&self, event: IrcEvent) {
        if self.events_tx.send(BridgeEvent::Irc(event)).is_err() {
            warn!("Bridge event channel closed, dropping IRC event");
        }
    }
}
