//! Logging service

use crate::models::LogLevel;

/// Initialize logging with the specified level.
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match level {
        LogLevel::Error => "busrelay=error,busrelay_core=error",
        LogLevel::Warn => "busrelay=warn,busrelay_core=warn",
        LogLevel::Info => "busrelay=info,busrelay_core=info",
        LogLevel::Debug => "busrelay=debug,busrelay_core=debug",
        LogLevel::Trace => "busrelay=trace,busrelay_core=trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()?;

    Ok(())
}

/// Log a completed relay operation
pub fn log_relay_event(operation: &str, topic: &str, details: Option<&str>) {
    tracing::info!(
        operation = operation,
        topic = topic,
        details = details.unwrap_or(""),
        "Relay operation completed"
    );
}

/// Log a failed operation
pub fn log_error(error: &str, context: Option<&str>) {
    tracing::error!(
        error = error,
        context = context.unwrap_or(""),
        "Relay operation failed"
    );
}
