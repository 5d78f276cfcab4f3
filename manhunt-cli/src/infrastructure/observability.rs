use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub default_level: tracing::Level,
    pub show_thread_ids: bool,
    pub show_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: tracing::Level::INFO,
            show_thread_ids: false,
            show_targets: false,
        }
    }
}

impl LogConfig {
    /// Development configuration (verbose, human-readable)
    pub fn dev() -> Self {
        Self {
            default_level: tracing::Level::DEBUG,
            show_thread_ids: true,
            show_targets: true,
        }
    }

    pub fn init(self) -> Result<(), String> {
        // RUST_LOG wins when set
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                self.default_level
            ))
            .add_directive(
                format!("manhunt_core={}", self.default_level)
                    .parse()
                    .unwrap(),
            )
            .add_directive(
                format!("manhunt_p2p={}", self.default_level)
                    .parse()
                    .unwrap(),
            )
        });

        let fmt_layer = fmt::layer()
            .with_target(self.show_targets)
            .with_thread_ids(self.show_thread_ids);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| format!("Failed to initialize tracing: {}", e))
    }
}
