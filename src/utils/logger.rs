use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for the application
pub fn init() {
    // Set default log level from environment or use INFO
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ssh_port_forwarder=debug"));

    install(filter);
}

/// Initialize logging with custom level
pub fn init_with_level(level: &str) {
    install(EnvFilter::new(format!("{},ssh_port_forwarder={}", level, level)));
    tracing::debug!("Logging initialized with level: {}", level);
}

fn install(filter: EnvFilter) {
    // A subscriber installed by the host app wins
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_line_number(true))
        .try_init();
}
