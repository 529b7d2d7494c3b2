//! Types shared between the marble server and its browser client.
//!
//! Wire types derive `ts_rs::TS`; running the tests regenerates the
//! TypeScript definitions under `static/marblegame/generated/`.

pub mod config;
pub mod protocol;
pub mod quat;
pub mod vec2;
