//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered in order of
//! increasing precedence:
//!
//! 1. Built-in defaults ([`AutomationConfig::default`])
//! 2. `<dir>/automation.yaml`
//! 3. `<dir>/automation.<environment>.yaml`
//! 4. `AUTOMATION__SECTION__FIELD` environment variables
//!
//! Missing files are skipped; malformed files are errors.

use super::error::{ConfigResult, ConfigurationError};
use super::AutomationConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "AUTOMATION";

pub struct ConfigManager {
    config: AutomationConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading automation configuration"
        );

        let config = Self::build(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            batch_size = config.logger.batch_size,
            max_retry_attempts = config.orchestrator.max_retry_attempts,
            scheduler_interval_seconds = config.orchestrator.scheduler_interval_seconds,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (embedding hosts, tests)
    pub fn from_config(config: AutomationConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the current environment from `AUTOMATION_ENV`, then `APP_ENV`
    pub fn detect_environment() -> String {
        env::var("AUTOMATION_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn build(config_directory: &Path, environment: &str) -> ConfigResult<AutomationConfig> {
        let base_file = config_directory.join("automation.yaml");
        let env_file = config_directory.join(format!("automation.{environment}.yaml"));

        let settings = Config::builder()
            .add_source(File::from(base_file.as_path()).required(false))
            .add_source(File::from(env_file.as_path()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_failed(config_directory.display().to_string(), e))?;

        settings
            .try_deserialize::<AutomationConfig>()
            .map_err(|e| ConfigurationError::InvalidStructure {
                error: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_directory_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().join("absent")), "test")
                .unwrap();
        assert_eq!(manager.config().logger.batch_size, 50);
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_environment_file_overrides_base_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("automation.yaml"),
            "logger:\n  batch_size: 20\n  retention_days: 30\norchestrator:\n  max_retry_attempts: 5\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("automation.test.yaml"),
            "logger:\n  batch_size: 5\n",
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        let config = manager.config();
        assert_eq!(config.logger.batch_size, 5);
        assert_eq!(config.logger.retention_days, 30);
        assert_eq!(config.orchestrator.max_retry_attempts, 5);
        assert_eq!(config.orchestrator.scheduler_interval_seconds, 60);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("automation.yaml"),
            "orchestrator:\n  max_retry_attempts: 0\n",
        )
        .unwrap();

        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }
}
