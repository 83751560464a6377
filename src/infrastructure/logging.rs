use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVE: &str = "activity_scheduler=info";

/// Installs a fmt subscriber filtered by `RUST_LOG`, or `default_directive`
/// when unset. Returns false if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
