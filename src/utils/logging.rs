//! Tracing initialization for embedders
//!
//! The routing core logs through `tracing` only; embedders that don't bring
//! their own subscriber can call [`init`] once at startup.

use tracing_subscriber::{EnvFilter, fmt};

/// Install a formatted subscriber honoring `RUST_LOG` (default `info`).
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
