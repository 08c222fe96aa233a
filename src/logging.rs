// 📜 Logging - tracing subscriber setup shared by the CLI and the server

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. RUST_LOG wins over `default_level`.
/// Safe to call more than once; later calls are ignored.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("calamine=warn,{}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
