//! Tracing subscriber setup for the command-line tool.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Map `-q`/`-v` counts to a level. Quiet wins over verbose.
pub fn level_for(quiet: u8, verbose: u8) -> Level {
    match (quiet, verbose) {
        (q, _) if q > 0 => Level::ERROR,
        (_, 0) => Level::WARN,
        (_, 1) => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Log to stderr. `RUST_LOG` overrides the level chosen on the command line.
pub fn init_logging(level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("otazip={}", level.as_str().to_ascii_lowercase())));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
