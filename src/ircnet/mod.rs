//! IRC side of the bridge.

pub mod client;
pub mod handler;
pub mod service;

pub use client::IrcConnection;
