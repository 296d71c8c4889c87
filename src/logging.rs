// Logging
// Injected logging collaborator used by the connection manager

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log target used for every message the adapter emits
pub const LOG_TARGET: &str = "azuredatawarehouse";

/// Logger accepting the two severities the adapter reports at
pub trait AdapterLogger: Send + Sync {
    fn debug(&self, message: &str);

    fn critical(&self, message: &str);
}

/// Forwards adapter messages to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl AdapterLogger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: LOG_TARGET, "{}", message);
    }

    fn critical(&self, message: &str) {
        tracing::error!(target: LOG_TARGET, critical = true, "{}", message);
    }
}

/// Shared handle to the default logger
pub fn tracing_logger() -> Arc<dyn AdapterLogger> {
    Arc::new(TracingLogger)
}

/// Install a global fmt subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed (tests, embedding hosts)
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .try_init();
}
