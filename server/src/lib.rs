//! Marble game server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod channel;
pub mod chat;
pub mod client;
pub mod collision;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod game;
pub mod hub;
pub mod marble;
pub mod player;
pub mod protocol;
pub mod room;
pub mod scoring;
pub mod session;
pub mod ws;
