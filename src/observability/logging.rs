//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level so operators can raise verbosity
//! without editing config.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Default directive when neither `RUST_LOG` nor config say otherwise.
fn default_directive(level: &str) -> String {
    format!("waitlist_intake={level},audit={level},tower_http={level}")
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_covers_crate_and_audit_targets() {
        let d = default_directive("warn");
        assert!(d.contains("waitlist_intake=warn"));
        assert!(d.contains("audit=warn"));
        assert!(EnvFilter::try_new(d).is_ok());
    }
}
