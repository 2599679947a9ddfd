//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for the binaries
//! - Honour `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - ANSI colours only when stdout is a terminal, so piped logs stay greppable

use std::io::IsTerminal;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
pub fn init(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives(log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(std::io::stdout().is_terminal()))
        .init();
}

fn default_directives(log_level: &str) -> String {
    format!("graceful_reboot={log_level},gracectl={log_level},tower_http={log_level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_parse() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("graceful_reboot=debug"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
