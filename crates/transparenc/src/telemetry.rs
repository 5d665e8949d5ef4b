// transparenc/crates/transparenc/src/telemetry.rs

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber.
///
/// Logs go to stderr so the transcript printed on stdout stays readable.
/// `RUST_LOG` wins over `default_level` when set.
pub fn init_tracing(default_level: &str) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
