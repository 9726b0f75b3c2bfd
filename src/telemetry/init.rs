// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing subscriber installation for hosts embedding this crate.

use std::io;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Target prefix of every event this crate emits.
const CRATE_TARGET: &str = "devlink";

/// Configuration for telemetry initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Level for this crate's events when no directive applies.
    pub default_level: Level,

    /// Level for every other target (HTTP client, runtime).
    pub dependency_level: Level,

    /// Whether to log span close events with timings.
    pub include_span_events: bool,

    /// Whether to include file/line information.
    pub include_file_line: bool,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    /// Whether to use compact log format.
    pub compact: bool,

    /// Explicit filter directive. `RUST_LOG` still wins when set.
    pub filter_directive: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            dependency_level: Level::WARN,
            include_span_events: false,
            include_file_line: false,
            ansi_colors: true,
            compact: true,
            filter_directive: None,
        }
    }
}

impl TelemetryConfig {
    /// Verbose output with session construction timings.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            include_file_line: true,
            compact: false,
            ..Self::default()
        }
    }

    /// Warnings and errors only, no colors, for tool servers writing to a log file.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            dependency_level: Level::ERROR,
            ansi_colors: false,
            ..Self::default()
        }
    }

    /// Everything this crate emits, for debugging tests.
    pub fn testing() -> Self {
        Self {
            default_level: Level::TRACE,
            include_span_events: true,
            include_file_line: true,
            ansi_colors: false,
            compact: false,
            filter_directive: Some(format!("{}=trace", CRATE_TARGET)),
            ..Self::default()
        }
    }

    /// Set the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set a custom filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    /// Enable or disable ANSI colors.
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn directive(&self) -> String {
        match &self.filter_directive {
            Some(directive) => directive.clone(),
            None => format!(
                "{},{}={}",
                self.dependency_level, CRATE_TARGET, self.default_level
            ),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(self.directive()))
            .unwrap_or_else(|_| EnvFilter::new(self.default_level.to_string()))
    }
}

/// Returned by [`init_telemetry`]; keep it alive for the life of the host.
#[must_use]
pub struct TelemetryGuard {
    _private: (),
}

/// Install a global tracing subscriber writing to stderr.
///
/// Fails if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,ignore
/// use devlink::telemetry::{init_telemetry, TelemetryConfig};
///
/// let _guard = init_telemetry(&TelemetryConfig::production())?;
/// ```
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<TelemetryGuard> {
    let span_events = if config.include_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi_colors)
        .with_target(true)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(config.env_filter());
    let installed = if config.compact {
        registry.with(fmt_layer.compact()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };
    installed.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(TelemetryGuard { _private: () })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert_eq!(config.directive(), "WARN,devlink=INFO");
        assert!(config.compact);
    }

    #[test]
    fn test_telemetry_config_presets() {
        let development = TelemetryConfig::development();
        assert_eq!(development.default_level, Level::DEBUG);
        assert!(development.include_span_events);

        let production = TelemetryConfig::production();
        assert_eq!(production.directive(), "ERROR,devlink=WARN");
        assert!(!production.ansi_colors);

        let testing = TelemetryConfig::testing();
        assert_eq!(testing.directive(), "devlink=trace");
    }

    #[test]
    fn test_telemetry_config_builder() {
        let config = TelemetryConfig::default()
            .with_level(Level::DEBUG)
            .with_filter("devlink::session=trace")
            .with_ansi(false);

        assert_eq!(config.default_level, Level::DEBUG);
        assert_eq!(config.directive(), "devlink::session=trace");
        assert!(!config.ansi_colors);
    }
}
