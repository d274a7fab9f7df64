//! # Logging
//!
//! Installs the global `tracing` subscriber for one node command. Each
//! command has its own default directives; `RUST_LOG` replaces them when set.
//! Output goes to stderr, leaving stdout to the `demo` event log.

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives for `serve`: contract state transitions plus HTTP request spans.
pub const SERVE_DIRECTIVES: &str = "quorum_node=info,quorum_contracts=info,tower_http=debug";

/// Directives for `demo`. Contract logs stay at `warn` so rejected executions
/// show up next to the printed event log without drowning it.
pub const DEMO_DIRECTIVES: &str = "quorum_node=info,quorum_contracts=warn";

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Multi-field lines with source locations.
    Pretty,
    /// One short line per event, no source locations.
    Compact,
    /// JSON lines.
    Json,
}

/// Which directives and layout a command logs with.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    pub directives: &'static str,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn serve(format: LogFormat) -> Self {
        Self {
            directives: SERVE_DIRECTIVES,
            format,
        }
    }

    pub fn demo(format: LogFormat) -> Self {
        Self {
            directives: DEMO_DIRECTIVES,
            format,
        }
    }

    /// The filter in effect: `RUST_LOG` if it parses, else the command's
    /// defaults.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives))
    }
}

/// Installs the subscriber described by `config`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(config: LogConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(config.filter());

    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(false))
            .try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    tracing::debug!(directives = config.directives, format = ?config.format, "logging ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_directives_parse() {
        for directives in [SERVE_DIRECTIVES, DEMO_DIRECTIVES] {
            assert!(EnvFilter::try_new(directives).is_ok(), "{directives}");
        }
    }

    #[test]
    fn format_names_match_cli_values() {
        assert_eq!(LogFormat::from_str("json", true), Ok(LogFormat::Json));
        assert_eq!(LogFormat::from_str("COMPACT", true), Ok(LogFormat::Compact));
        assert!(LogFormat::from_str("yaml", true).is_err());
    }

    #[test]
    fn configs_carry_command_defaults() {
        assert_eq!(LogConfig::serve(LogFormat::Json).directives, SERVE_DIRECTIVES);
        assert_eq!(LogConfig::demo(LogFormat::Compact).format, LogFormat::Compact);
    }
}
