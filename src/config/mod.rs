//! Layered configuration: optional file, then `TASKQ__*` environment variables.
//!
//! | Key                          | Env var                              | Default          |
//! |------------------------------|--------------------------------------|------------------|
//! | `server.bind_addr`           | `TASKQ__SERVER__BIND_ADDR`           | `0.0.0.0:8081`   |
//! | `server.shutdown_grace_ms`   | `TASKQ__SERVER__SHUTDOWN_GRACE_MS`   | `5000`           |
//! | `server.cors_origins`        | `TASKQ__SERVER__CORS_ORIGINS`        | `["*"]`          |
//! | `queue.capacity`             | `TASKQ__QUEUE__CAPACITY`             | `100`            |
//! | `queue.admission_timeout_ms` | `TASKQ__QUEUE__ADMISSION_TIMEOUT_MS` | `1000`           |
//! | `worker.processing_delay_ms` | `TASKQ__WORKER__PROCESSING_DELAY_MS` | `2000`           |
//! | `worker.failure_rate`        | `TASKQ__WORKER__FAILURE_RATE`        | `0.2`            |
//!
//! The file is looked up as `taskq.{toml,yaml,json}` in the working directory
//! unless `TASKQ_CONFIG` names another base path. It is optional.
//! `TASKQ__SERVER__CORS_ORIGINS` takes a comma-separated list.

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    queue::{SimulatedProcessor, TaskService},
    security::CorsMiddleware,
};

/// Environment variable that overrides the configuration file base path.
pub const CONFIG_PATH_ENV: &str = "TASKQ_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "taskq";
const ENV_PREFIX: &str = "TASKQ";

/// Errors produced while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Top-level settings for the `taskq` binary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub queue: QueueSettings,
    pub worker: WorkerSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub shutdown_grace_ms: u64,
    /// Origins accepted by the CORS layer; `"*"` accepts all of them.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_owned(),
            shutdown_grace_ms: 5_000,
            cors_origins: vec!["*".to_owned()],
        }
    }
}

impl ServerSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn build_cors(&self) -> CorsMiddleware {
        CorsMiddleware::restricted(self.cors_origins.iter().cloned())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub capacity: usize,
    pub admission_timeout_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: 100,
            admission_timeout_ms: 1_000,
        }
    }
}

impl QueueSettings {
    pub fn admission_timeout(&self) -> Duration {
        Duration::from_millis(self.admission_timeout_ms)
    }

    /// Builds a [`TaskService`] from these settings.
    pub fn build_service(&self) -> TaskService {
        TaskService::new(self.capacity).with_admission_timeout(self.admission_timeout())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub processing_delay_ms: u64,
    pub failure_rate: f64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            processing_delay_ms: 2_000,
            failure_rate: 0.2,
        }
    }
}

impl WorkerSettings {
    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }

    /// Builds the default [`SimulatedProcessor`] from these settings.
    pub fn build_processor(&self) -> SimulatedProcessor {
        SimulatedProcessor::new(self.processing_delay(), self.failure_rate)
    }
}

impl Settings {
    /// Loads settings from the configuration file and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if a source cannot be read or parsed, and
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        Self::load_from(&path)
    }

    /// Like [`load`](Self::load), with an explicit configuration file base path.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.cors_origins.is_empty() {
            return Err(ConfigError::Invalid {
                key: "server.cors_origins",
                reason: "must list at least one origin".to_owned(),
            });
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "queue.capacity",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if !(0.0..=1.0).contains(&self.worker.failure_rate) {
            return Err(ConfigError::Invalid {
                key: "worker.failure_rate",
                reason: format!("{} is outside [0, 1]", self.worker.failure_rate),
            });
        }
        Ok(())
    }
}

// `TASKQ__SECTION__KEY` variables. Values are parsed into numbers where
// possible and `server.cors_origins` is split on commas.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("server.cors_origins")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.bind_addr, "0.0.0.0:8081");
        assert_eq!(settings.server.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(settings.queue.capacity, 100);
        assert_eq!(settings.queue.admission_timeout(), Duration::from_secs(1));
        assert_eq!(settings.worker.processing_delay(), Duration::from_secs(2));
        assert!((settings.worker.failure_rate - 0.2).abs() < f64::EPSILON);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::load_from("definitely/not/a/real/taskq-config").unwrap();
        assert_eq!(settings.queue.capacity, 100);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                "[queue]\ncapacity = 5\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.queue.capacity, 5);
        assert_eq!(settings.queue.admission_timeout_ms, 1_000);
        assert_eq!(settings.server.bind_addr, "0.0.0.0:8081");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut settings = Settings::default();
        settings.queue.capacity = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid {
                key: "queue.capacity",
                ..
            })
        ));
    }

    #[test]
    fn failure_rate_out_of_range_is_rejected() {
        let mut settings = Settings::default();
        settings.worker.failure_rate = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn builds_service_with_capacity() {
        let mut settings = QueueSettings::default();
        settings.capacity = 3;
        let service = settings.build_service();
        assert_eq!(service.capacity(), 3);
    }

    #[test]
    fn cors_origins_from_environment_list() {
        let vars = config::Map::from([
            (
                "TASKQ__SERVER__CORS_ORIGINS".to_owned(),
                "https://a.example.com,https://b.example.com".to_owned(),
            ),
            ("TASKQ__QUEUE__CAPACITY".to_owned(), "7".to_owned()),
        ]);
        let settings: Settings = Config::builder()
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(
            settings.server.cors_origins,
            vec!["https://a.example.com", "https://b.example.com"]
        );
        assert_eq!(settings.queue.capacity, 7);
    }

    #[test]
    fn empty_cors_origins_is_rejected() {
        let mut settings = Settings::default();
        settings.server.cors_origins.clear();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid {
                key: "server.cors_origins",
                ..
            })
        ));
    }
}
