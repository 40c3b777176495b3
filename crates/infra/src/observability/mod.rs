//! Tracing subscriber setup
//!
//! The library only emits `tracing` events; binaries and test harnesses call
//! [`init_tracing`] once to install a subscriber. The filter comes from
//! `TABLEMATE_LOG` (an `EnvFilter` directive such as
//! `tablemate_infra=debug`) and defaults to `info`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::loader::env_bool;

/// Environment variable holding the filter directive
pub const LOG_ENV_VAR: &str = "TABLEMATE_LOG";
/// Environment variable selecting JSON output
pub const LOG_JSON_ENV_VAR: &str = "TABLEMATE_LOG_JSON";

const DEFAULT_DIRECTIVE: &str = "info";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// `Json` when `TABLEMATE_LOG_JSON` is truthy
    pub fn from_env() -> Self {
        if env_bool(LOG_JSON_ENV_VAR, false) {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed, which makes
/// repeated calls (e.g. from several tests) harmless.
pub fn init_tracing(format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter());
    let installed = match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    installed.is_ok()
}
