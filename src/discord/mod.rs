//! Discord bot integration.

pub mod client;
pub mod commands;
pub mod resolver;
pub mod service;

pub use client::DiscordBot;
