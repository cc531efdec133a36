//! Snype arena
//!
//! Room relay server for a browser FPS plus the deterministic movement and
//! projectile core the client runs every frame.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod map;
pub mod physics;
pub mod util;
pub mod ws;
