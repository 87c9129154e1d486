//! Diagnostic tracing for yeet.
//!
//! Tracing goes to stderr and is for diagnosing yeet itself. Stack events,
//! workload reports and rendered documents are product output on stdout and
//! never depend on the filter chosen here.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "YEET_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Initialize the tracing subscriber.
///
/// ```bash
/// YEET_LOG=yeet=debug yeet output inputs app.yml
/// ```
pub fn init() {
    let filter = filter_directives(|key| std::env::var(key).ok());
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// `YEET_LOG`, then `RUST_LOG`, then `warn`. Blank values are skipped.
fn filter_directives(env: impl Fn(&str) -> Option<String>) -> String {
    [LOG_ENV, "RUST_LOG"]
        .into_iter()
        .filter_map(|key| env(key))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn directives(vars: &[(&str, &str)]) -> String {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        filter_directives(|key| vars.get(key).cloned())
    }

    #[test]
    fn yeet_log_wins() {
        assert_eq!(
            directives(&[(LOG_ENV, "yeet=debug"), ("RUST_LOG", "info")]),
            "yeet=debug"
        );
    }

    #[test]
    fn falls_back_to_rust_log() {
        assert_eq!(directives(&[(LOG_ENV, " "), ("RUST_LOG", "info")]), "info");
    }

    #[test]
    fn defaults_to_warn() {
        assert_eq!(directives(&[]), "warn");
    }
}
