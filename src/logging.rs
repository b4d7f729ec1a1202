//! Tracing setup and log redaction helpers.

use sha2::{Digest, Sha256};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_DEV_LOG: &str = "REVIEW_LOG";
pub const ENV_LOG_JSON: &str = "REVIEW_LOG_JSON";
const DEFAULT_FILTER: &str = "review_sentinel=info,intake=info,notify=info,store=info,warn";

/// Install a global subscriber. Filter comes from `RUST_LOG` when set.
/// `REVIEW_LOG_JSON=1` switches to JSON lines. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(ENV_LOG_JSON).ok().is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Dev logging gate for hosted runs: `REVIEW_LOG=1` AND a dev environment
/// (debug build or `SHUTTLE_ENV` in {local, development, dev}).
pub fn dev_logging_enabled() -> bool {
    let on = std::env::var(ENV_DEV_LOG).ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Short stable id for a sensitive value (phone number, review body).
/// Never log the raw value, log this instead.
pub fn anon_id(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
