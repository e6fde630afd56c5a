//! # Configuration Management
//!
//! Loads application configuration from three layers, highest priority last:
//! 1. Built-in defaults (the `Default` impl below)
//! 2. `config.toml` in the working directory (optional)
//! 3. Environment variables with an `APP_` prefix and `__` between path
//!    segments (e.g. `APP_SERVER__PORT`, `APP_LIMITS__MAX_UPLOAD_BYTES` —
//!    a single `_` would split snake_case field names), plus the bare
//!    `HOST` / `PORT` overrides deployment platforms set
//!
//! The pipeline's numeric hyperparameters are deliberately **not** here: they
//! are compile-time constants in [`crate::pipeline::contract`], versioned
//! together with the model artifact. Configuration only decides *where* the
//! artifact and sample assets live and how the server is exposed.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub samples: SamplesConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where the classifier weights live and how long a load may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the safetensors artifact matching the compiled-in contract.
    pub weights_path: String,
    pub load_timeout_secs: u64,
}

/// The bundled sample clips prefetched at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplesConfig {
    /// Static asset root the sample files are read from.
    pub dir: String,
    /// Well-known sample file names under `dir`.
    pub files: Vec<String>,
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted upload size for `/predict` (bytes).
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            model: ModelConfig {
                weights_path: "models/agila-eagle.safetensors".to_string(),
                load_timeout_secs: 30,
            },
            samples: SamplesConfig {
                dir: "assets/samples".to_string(),
                files: vec![
                    "eagle_call_1.wav".to_string(),
                    "eagle_call_2.wav".to_string(),
                    "forest_ambience.wav".to_string(),
                    "other_bird.wav".to_string(),
                ],
                fetch_timeout_secs: 10,
            },
            limits: LimitsConfig {
                max_upload_bytes: 16 * 1024 * 1024, // 16MB, same cap as the upload form
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml`, and the environment.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Deployment platforms commonly inject these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject configurations that cannot possibly work before the server starts.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.model.weights_path.is_empty() {
            return Err(anyhow::anyhow!("Model weights path cannot be empty"));
        }

        if self.model.load_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Model load timeout must be greater than 0"));
        }

        if self.samples.fetch_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Sample fetch timeout must be greater than 0"));
        }

        if self.limits.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        Ok(())
    }

    /// Apply a partial update from a JSON document (the `PUT /config` body).
    ///
    /// Only the fields present in the JSON are touched; the result is
    /// validated before it replaces the running configuration.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(model) = partial.get("model") {
            if let Some(path) = model.get("weights_path").and_then(|v| v.as_str()) {
                self.model.weights_path = path.to_string();
            }
            if let Some(timeout) = model.get("load_timeout_secs").and_then(|v| v.as_u64()) {
                self.model.load_timeout_secs = timeout;
            }
        }

        if let Some(samples) = partial.get("samples") {
            if let Some(timeout) = samples.get("fetch_timeout_secs").and_then(|v| v.as_u64()) {
                self.samples.fetch_timeout_secs = timeout;
            }
        }

        if let Some(limits) = partial.get("limits") {
            if let Some(max) = limits.get("max_upload_bytes").and_then(|v| v.as_u64()) {
                self.limits.max_upload_bytes = max as usize;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.limits.max_upload_bytes, 16 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.model.weights_path.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"server": {"port": 9090}, "model": {"weights_path": "models/v2.safetensors"}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.model.weights_path, "models/v2.safetensors");
        // Untouched fields keep their values
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_env_override_reaches_snake_case_fields() {
        env::set_var("APP_LIMITS__MAX_UPLOAD_BYTES", "1024");
        env::set_var("APP_MODEL__LOAD_TIMEOUT_SECS", "7");

        let config = AppConfig::load().unwrap();

        env::remove_var("APP_LIMITS__MAX_UPLOAD_BYTES");
        env::remove_var("APP_MODEL__LOAD_TIMEOUT_SECS");

        assert_eq!(config.limits.max_upload_bytes, 1024);
        assert_eq!(config.model.load_timeout_secs, 7);
    }

    #[test]
    fn test_update_rejects_invalid_result() {
        let mut config = AppConfig::default();
        let json = r#"{"limits": {"max_upload_bytes": 0}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
