//! Tracing setup for hosts that embed the monitor.
//!
//! The engine itself only emits `tracing` events; installing a subscriber is
//! left to the host. These helpers cover the common case.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "trainwatch=info";

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Installs a global fmt subscriber honoring `RUST_LOG`.
///
/// Subsequent calls are no-ops. Returns `false` when another subscriber was
/// already installed by the host.
pub fn init() -> bool {
    *INSTALLED.get_or_init(|| {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter())
            .try_init()
            .is_ok()
    })
}

/// Like [`init`] but routes output through the test harness capture.
#[cfg(test)]
pub(crate) fn init_for_tests() -> bool {
    *INSTALLED.get_or_init(|| {
        tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(env_filter())
            .try_init()
            .is_ok()
    })
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
