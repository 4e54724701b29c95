//! Tracing and logging setup shared by the binaries.

use serde::{Deserialize, Serialize};

/// Output format of the process log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event. Used in deployed environments.
    #[default]
    Json,
    /// Human-readable multi-line output for local runs.
    Pretty,
}

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}

/// Tracing configuration (filters, layers).
pub mod tracing {
    use tracing_subscriber::EnvFilter;

    use super::LogFormat;

    /// Filter used when `RUST_LOG` is unset or unparsable.
    pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

    pub fn env_filter() -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }

    /// Install the global subscriber. Safe to call multiple times (subsequent
    /// calls are no-ops).
    pub fn init(format: LogFormat) {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_timer(tracing_subscriber::fmt::time::SystemTime);

        let _ = match format {
            LogFormat::Json => builder
                .json()
                .with_current_span(true)
                .with_target(false)
                .try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init(LogFormat::Pretty);
        init(LogFormat::Json);
        ::tracing::info!("still logging");
    }
}
