use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Log level and optional OTLP collector endpoint, shared by every binary.
#[derive(Debug, Deserialize, Clone)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load layered settings: `.env`, then the YAML file, then `APP_` environment
/// variables (`APP_SERVER__PORT=8080` overrides `server.port`).
pub fn load<T: DeserializeOwned>(file: &Path, required: bool) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let config = Cfg::builder()
        .add_source(File::from(file).required(required))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
