use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Resolve the log filter: `RUST_LOG` wins, then the configured level, then `info`.
pub fn filter(configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Logs go to stderr; stdout carries tool output.
pub fn init(configured: &str) {
    let result = tracing_subscriber::registry()
        .with(filter(configured))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}
