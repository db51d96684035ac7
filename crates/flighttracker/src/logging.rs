//! Tracing setup for the `flighttracker` binary.
//!
//! The default filter covers this crate and the HTTP request spans emitted by
//! `tower-http`; `RUST_LOG` replaces it entirely when set.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much the binary logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Cycle summaries, lifecycle events and warnings.
    #[default]
    Normal,
    /// Adds per-field decode diagnostics and request URLs.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// The most detailed level shown at this verbosity.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// The `EnvFilter` directive used when `RUST_LOG` is unset.
    #[must_use]
    pub fn filter_directive(self) -> String {
        let level = self.level();
        let http = match self {
            Self::Quiet | Self::Normal => Level::WARN.min(level),
            Self::Verbose | Self::Trace => level,
        };
        format!("flighttracker={level},tower_http={http}")
    }
}

/// Install the global subscriber. Later calls are ignored.
///
/// ```no_run
/// use flighttracker::logging::{init_logging, Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // a subscriber may already be installed (tests, embedding)
    let _ = subscriber.try_init();
}
