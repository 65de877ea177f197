//! Logging initialization, invoked once from `main` (ambient stack).
//!
//! Grounded on `marlonsc-mcb`'s `docs-adr-validator`/`docs-generator`
//! binaries (`src/main.rs`), which wire `tracing_subscriber::fmt` with an
//! `EnvFilter` straight off `RUST_LOG`. Generalized only to let a `-v`/`-q`
//! CLI flag raise or lower the default level when `RUST_LOG` is unset.

use tracing_subscriber::EnvFilter;

/// Verbosity requested by repeated `-v` flags, applied only when
/// `RUST_LOG` is not set in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    fn default_filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn,schema_forge=info",
            Verbosity::Verbose => "info,schema_forge=debug",
            Verbosity::Debug => "debug",
        }
    }
}

/// Initialize the global `tracing` subscriber. Safe to call at most once;
/// `main` is the only caller.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Normal < Verbosity::Verbose);
        assert!(Verbosity::Verbose < Verbosity::Debug);
    }

    #[test]
    fn test_default_filters_are_non_empty() {
        assert!(!Verbosity::Quiet.default_filter().is_empty());
        assert!(!Verbosity::Debug.default_filter().is_empty());
    }
}
