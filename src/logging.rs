use tracing_subscriber::EnvFilter;

/// Instala el subscriber de `tracing` hacia stderr. El nivel se controla con
/// `RUST_LOG` (por defecto `warn`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
