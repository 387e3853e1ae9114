//! IRC collaborator seam.
//!
//! Sends are queued on the connection and return immediately; there is no
//! delivery acknowledgement.

use crate::common::error::IrcResult;

/// Outbound IRC operations the bridge needs.
pub trait IrcService: Send + Sync {
    fn privmsg(&self, target: &str, text: &str) -> IrcResult<()>;

    fn join(&self, channel: &str, key: Option<&str>) -> IrcResult<()>;

    /// Request a NAMES roster; the reply arrives later as an event.
    fn names(&self, channel: &str) -> IrcResult<()>;
}
