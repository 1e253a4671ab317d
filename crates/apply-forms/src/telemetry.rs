use std::fmt;

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level when present.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)
}

fn level_filter(log_level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(log_level).map_err(|source| TelemetryError::InvalidLevel {
        value: log_level.to_string(),
        source,
    })
}

#[derive(Debug)]
pub enum TelemetryError {
    InvalidLevel { value: String, source: ParseError },
    Install(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::InvalidLevel { value, .. } => {
                write!(f, "APP_LOG_LEVEL must be a tracing filter directive, got '{value}'")
            }
            TelemetryError::Install(err) => {
                write!(f, "unable to install the global tracing subscriber: {err}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::InvalidLevel { source, .. } => Some(source),
            TelemetryError::Install(err) => Some(&**err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_strings_build_a_filter() {
        assert!(level_filter("info").is_ok());
        assert!(level_filter("apply_forms=debug,warn").is_ok());
    }

    #[test]
    fn malformed_directives_surface_the_offending_value() {
        match level_filter("===") {
            Err(TelemetryError::InvalidLevel { value, .. }) => assert_eq!(value, "==="),
            Ok(_) => panic!("expected invalid-level error"),
            Err(other) => panic!("expected invalid-level error, got {other:?}"),
        }
    }
}
