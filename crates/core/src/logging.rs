//! Global subscriber setup for binaries embedding the engine.

use tracing::Level;

use crate::config::{LogFormat, LoggingConfig};

fn parse_level(level: &str) -> Level {
    level.parse::<Level>().unwrap_or(Level::INFO)
}

/// Install the global subscriber from config. Call once at startup, before
/// any other operation that logs.
pub fn init(config: &LoggingConfig) {
    let level = parse_level(&config.level);

    match config.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(level).compact().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(level).pretty().init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(level).json().init();
        }
    }
}
