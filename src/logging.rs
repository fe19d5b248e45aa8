//! Diagnostics for the metahub CLI.
//!
//! Log lines go to stderr so `--json` output on stdout stays parseable.
//! The `-v` count raises the level for this crate only; dependency noise
//! stays at warn until `-vvv` opens everything up. A `RUST_LOG` value
//! replaces the derived filter entirely.

use tracing_subscriber::EnvFilter;

use crate::error::Error;

/// Resolve the filter directive: an explicit `RUST_LOG` wins, otherwise
/// the `-v` count scopes detail to the `metahub` target.
fn filter_spec(verbosity: u8, rust_log: Option<&str>) -> String {
    if let Some(spec) = rust_log {
        if !spec.trim().is_empty() {
            return spec.to_string();
        }
    }
    match verbosity {
        0 => "warn".to_string(),
        1 => "warn,metahub=info".to_string(),
        2 => "warn,metahub=debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber for a CLI invocation.
pub fn init(verbosity: u8) -> Result<(), Error> {
    let spec = filter_spec(verbosity, std::env::var("RUST_LOG").ok().as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(spec))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_quiet() {
        assert_eq!(filter_spec(0, None), "warn");
    }

    #[test]
    fn single_v_scopes_info_to_this_crate() {
        assert_eq!(filter_spec(1, None), "warn,metahub=info");
    }

    #[test]
    fn double_v_scopes_debug_to_this_crate() {
        assert_eq!(filter_spec(2, None), "warn,metahub=debug");
    }

    #[test]
    fn triple_v_opens_all_targets() {
        assert_eq!(filter_spec(3, None), "trace");
        assert_eq!(filter_spec(9, None), "trace");
    }

    #[test]
    fn rust_log_replaces_derived_filter() {
        assert_eq!(filter_spec(2, Some("metahub::ingest=trace")), "metahub::ingest=trace");
    }

    #[test]
    fn blank_rust_log_is_ignored() {
        assert_eq!(filter_spec(1, Some("  ")), "warn,metahub=info");
        assert_eq!(filter_spec(1, Some("")), "warn,metahub=info");
    }
}
