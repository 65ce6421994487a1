//! Tracing subscriber setup for hosts and examples.

use tracing_subscriber::EnvFilter;

/// Install a formatted `tracing` subscriber.
///
/// The filter comes from `RUST_LOG`, or `default_filter` when it is unset or
/// invalid (for example `"devtools_rag=info"`). Calling this again, or after
/// another global subscriber was installed, does nothing and returns `false`.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init_tracing("devtools_rag=debug");
        assert!(!init_tracing("devtools_rag=debug"));
    }
}
