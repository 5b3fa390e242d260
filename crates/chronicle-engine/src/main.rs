//! Demo binary for the Chronicle temporal engine.
//!
//! Builds a small manor on top of a [`World`] and lets a player wait while
//! the grandfather clock strikes the hours, the hearth burns down, and a
//! resident wanders between rooms. Everything the household does happens
//! inside the scheduler as the player's waits advance the world clock.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `chronicle-config.yaml` (or the path given as
//!    the first argument)
//! 2. Initialize structured logging (tracing)
//! 3. Open the world store
//! 4. Build the manor
//! 5. Run the player's waits
//! 6. Log the result

mod error;
mod grandfather;
mod hearth;
mod manor;
mod wanderer;

use std::path::{Path, PathBuf};

use chronicle_core::World;
use chronicle_core::config::{ChronicleConfig, LogFormat, LoggingConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const CONFIG_FILE: &str = "chronicle-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the demo run fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        world_name = config.world.name,
        database_path = config.world.database_path,
        default_interval_ms = config.scheduler.default_interval_ms,
        config_path = %config_path.display(),
        "chronicle-engine starting"
    );

    // 3. Open the world.
    let world = World::from_config(&config).map_err(EngineError::from)?;
    info!(now = %world.now(), "World opened");

    // 4. Build the scene.
    let manor = manor::build(&world, &config.demo)?;

    // 5. Run.
    let report = manor::run(&world, &manor, &config.demo)?;

    // 6. Log results.
    info!(
        waits = report.waits,
        final_time = %report.final_time,
        calendar = ?world.calendar_now(),
        "chronicle-engine shutdown complete"
    );

    Ok(())
}

/// Load the configuration file, falling back to defaults if it is absent.
fn load_config(path: &Path) -> Result<ChronicleConfig, EngineError> {
    if path.exists() {
        Ok(ChronicleConfig::from_file(path)?)
    } else {
        let mut config = ChronicleConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}
