//! Configuration loading for the read-aloud player.
//!
//! All user-tunable settings are centralized here and loaded from
//! `conf/config.toml` if present. Any missing or invalid entries fall back to
//! defaults so playback can still start.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config};
pub use models::{AppConfig, KeyBindings, LogLevel};
