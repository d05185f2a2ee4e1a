//! Development-time tracing.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: diagnostics via `RUST_LOG`, written to stderr.
//!   Not persisted and not part of the run output.
//!
//! - **Run reports (`io/report`)**: product artifacts (`result.json`, per-pass
//!   snapshots, `output.md`). Written when requested, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`. Output is compact, on stderr, so
/// stdout stays reserved for the published draft.
///
/// # Example
/// ```bash
/// RUST_LOG=nexus=debug nexus run --topic "remote work" --platform linkedin
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
