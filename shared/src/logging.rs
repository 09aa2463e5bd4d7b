//! Shared logging utilities for consistent tracing across all services

use crate::types::ServiceId;
use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Output format for the stdout subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format: {other}")),
        }
    }
}

/// Build the per-service filter directive for a base level
pub fn filter_directive(service: &ServiceId, base_level: &str) -> String {
    match service {
        ServiceId::Orchestrator => format!("orchestrator={base_level},shared={base_level},tokio=warn"),
        ServiceId::TaskService => format!("task_service={base_level},shared={base_level}"),
        ServiceId::UserService => format!("user_service={base_level},shared={base_level}"),
        ServiceId::DeliveryService => format!("delivery_service={base_level},shared={base_level}"),
    }
}

/// Initialize tracing subscriber for the current service
///
/// `RUST_LOG` takes precedence over the derived per-service directive.
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_tracing(log_level: Option<&str>, format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let base_level = log_level.unwrap_or("info");
    let directive = filter_directive(ServiceId::current(), base_level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let result = match format {
        LogFormat::Compact => fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .try_init(),
        LogFormat::Json => fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .flatten_event(true)
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for service-aware info logging
#[macro_export]
macro_rules! service_info {
    ($($arg:tt)*) => {
        tracing::info!(
            service = %$crate::ServiceId::current(),
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for service-aware warning logging
#[macro_export]
macro_rules! service_warn {
    ($($arg:tt)*) => {
        tracing::warn!(
            service = %$crate::ServiceId::current(),
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for service-aware error logging
#[macro_export]
macro_rules! service_error {
    ($($arg:tt)*) => {
        tracing::error!(
            service = %$crate::ServiceId::current(),
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for service-aware debug logging
#[macro_export]
macro_rules! service_debug {
    ($($arg:tt)*) => {
        tracing::debug!(
            service = %$crate::ServiceId::current(),
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(service: &ServiceId, details: &str) {
    info!(
        service = %service,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(service: &ServiceId, reason: &str) {
    info!(
        service = %service,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(service: &ServiceId, context: &str, error: &dyn std::fmt::Display) {
    error!(
        service = %service,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(service: &ServiceId, message: &str) {
    info!(
        service = %service,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}
