//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Install a JSON subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_current_span(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let _ = init("debug");
        assert!(!init(DEFAULT_FILTER));
        ::tracing::info!(event = "probe", "still logging after repeated init");
    }
}
