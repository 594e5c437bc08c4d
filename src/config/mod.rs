//! Application configuration module
//!
//! Configuration is read from environment variables with the
//! `SALES_DIALOGUE` prefix; nested values use double underscores.
//!
//! # Example
//!
//! ```no_run
//! use sales_dialogue::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod alerts;
mod engine;
mod error;
mod logging;
mod scheduler;
mod server;
mod storage;
mod transport;

pub use ai::{AiConfig, AiProvider};
pub use alerts::AlertsConfig;
pub use engine::{EngineConfig, OffScriptPolicy};
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use scheduler::SchedulerConfig;
pub use server::{Environment, ServerConfig};
pub use storage::StorageConfig;
pub use transport::TransportConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a working
/// development setup with the AI collaborator disabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Data directory and flush backoff
    #[serde(default)]
    pub storage: StorageConfig,

    /// Reply generator (OpenAI or disabled)
    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Auto-approval, follow-ups and session expiry
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Admin numbers and alert dedup
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Chat gateway and inbound webhook signing
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SALES_DIALOGUE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `SALES_DIALOGUE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SALES_DIALOGUE__ALERTS__ALERT_NUMBERS=549110001,549110002`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SALES_DIALOGUE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.storage.validate()?;
        self.ai.validate()?;
        self.engine.validate()?;
        self.scheduler.validate()?;
        self.alerts.validate()?;
        self.transport.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
