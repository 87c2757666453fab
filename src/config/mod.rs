//! Configuration loading for the sync engine.
//!
//! All tunables live here and are loaded from `conf/voicesync.toml` if
//! present. Missing or invalid entries fall back to defaults so a session can
//! always start.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{
    DebugFlags, LogLevel, MatchingConfig, SpeakerConfig, SyncConfig, TrackingConfig,
    TranscriptConfig, VelocityConfig,
};
