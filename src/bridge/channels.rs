//! Bridge channel management.
//!
//! Both network clients feed a single event queue drained by the bridge, so
//! every event is handled in arrival order.

use tokio::sync::{mpsc, watch};

use crate::common::BridgeEvent;

/// Senders handed to the IRC and Discord clients.
#[derive(Clone)]
pub struct EventSenders {
    pub irc_tx: mpsc::UnboundedSender<BridgeEvent>,
    pub discord_tx: mpsc::UnboundedSender<BridgeEvent>,
}

/// Receivers owned by the bridge task.
pub struct BridgeSideChannels {
    pub events_rx: mpsc::UnboundedReceiver<BridgeEvent>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    pub shutdown_tx: watch::Sender<bool>,
}

/// Bundle of all channels the bridge wires together.
pub struct ChannelBundle {
    pub senders: EventSenders,
    pub bridge: BridgeSideChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            senders: EventSenders {
                irc_tx: events_tx.clone(),
                discord_tx: events_tx,
            },
            bridge: BridgeSideChannels {
                events_rx,
                shutdown_rx,
            },
            control: ControlChannels { shutdown_tx },
        }
    }

    /// A receiver for tasks other than the bridge that must stop on shutdown.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.control.shutdown_tx.subscribe()
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}
