//! Arena Server - authoritative real-time server for a multiplayer 2D shooter
//!
//! - `game`: shared arena state, bullet physics and the fixed-rate tick loop
//! - `session`: per-connection onboarding, event routing and fan-out
//! - `ws` / `http`: the axum transport and auxiliary endpoints

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod session;
pub mod util;
pub mod ws;
