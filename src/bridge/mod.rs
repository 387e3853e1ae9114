//! Bridge core for IRC-Discord message coordination.
//!
//! ## Module Structure
//!
//! - `formatter`: markup and mention translation in both directions
//! - `cache`: recent Discord messages, for edit and reply quoting
//! - `attachments`: time-spaced attachment lines
//! - `filter`: regex deny-lists per direction
//! - `channels`: event queue and shutdown wiring
//! - `orchestrator`: the event router (`Bridge` struct)

pub mod attachments;
pub mod cache;
pub mod channels;
pub mod filter;
pub mod formatter;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use channels::ChannelBundle;
pub use orchestrator::Bridge;
