//! Time-spaced relay of Discord attachments to IRC.
//!
//! Each attachment becomes its own IRC line. Lines are queued with a
//! cumulative delay and sent by detached tasks; the caller never awaits them
//! and nothing retries a failed send.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::common::types::Attachment;
use crate::ircnet::service::IrcService;

/// Gap between consecutive attachment lines.
pub const ATTACHMENT_SPACING: Duration = Duration::from_millis(500);

/// One pending IRC line and how long after dispatch it goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledSend {
    pub delay: Duration,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct AttachmentDispatcher {
    spacing: Duration,
}

impl AttachmentDispatcher {
    pub fn new() -> Self {
        Self::with_spacing(ATTACHMENT_SPACING)
    }

    pub fn with_spacing(spacing: Duration) -> Self {
        Self { spacing }
    }

    /// Build the send queue: attachment `i` goes out after `i * spacing`.
    pub fn schedule<F>(&self, attachments: &[Attachment], format: F) -> Vec<ScheduledSend>
    where
        F: Fn(&Attachment) -> String,
    {
        attachments
            .iter()
            .enumerate()
            .map(|(i, attachment)| ScheduledSend {
                delay: self.spacing * i as u32,
                text: format(attachment),
            })
            .collect()
    }

    /// Spawn one detached timer per queued line.
    pub fn dispatch(&self, irc: Arc<dyn IrcService>, channel: &str, sends: Vec<ScheduledSend>) {
        for send in sends {
            let irc = Arc::clone(&irc);
            let channel = channel.to_string();
            tokio::spawn(async move {
                if !send.delay.is_zero() {
                    tokio::time::sleep(send.delay).await;
                }
                debug!("Sending attachment line after {:?}", send.delay);
                if let Err(e) = irc.privmsg(&channel, &send.text) {
                    error!("Failed to send attachment line to IRC: {}", e);
                }
            });
        }
    }
}

impl Default for AttachmentDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
