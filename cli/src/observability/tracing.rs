use std::{
    error::Error,
    io::{IsTerminal, stderr},
};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use warpstore_application::infrastructure_config::{Config, LogFormat};

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays machine readable; `RUST_LOG` overrides the configured level.
///
/// Fails instead of panicking when a subscriber is already installed.
pub fn setup_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(JsonStorageLayer)
                .with(BunyanFormattingLayer::new("warpstore".to_string(), stderr))
                .try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .event_format(fmt::format().with_target(false).compact())
                .with_writer(stderr)
                .with_ansi(stderr().is_terminal())
                .with_env_filter(env_filter)
                .try_init()
                .map_err(|e| e as Box<dyn Error>)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_second_subscriber_is_refused() {
        let config = Config::default();
        let _first = setup_logging(&config);

        assert!(setup_logging(&config).is_err());
    }
}
