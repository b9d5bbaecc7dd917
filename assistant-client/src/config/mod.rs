use serde::Deserialize;
use service_core::config::ObservabilitySettings;
use service_core::error::AppError;
use std::path::{Path, PathBuf};

use crate::transport::BearerToken;

/// Optional settings file, looked up in the working directory.
pub const SETTINGS_FILE: &str = "assistant.yaml";

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ClientSettings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApiSettings {
    /// Relay prefix every API path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default)]
    pub bearer_token: Option<BearerToken>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_path: default_chat_path(),
            bearer_token: None,
        }
    }
}

impl ApiSettings {
    pub fn chat_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.chat_path.trim_start_matches('/')
        )
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct StorageSettings {
    /// Directory holding the persisted conversation document.
    #[serde(default = "default_storage_dir")]
    pub directory: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            directory: default_storage_dir(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000/api/proxy".to_string()
}

fn default_chat_path() -> String {
    "/api/v1/chatbot/message".to_string()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".pitchdesk")
}

pub fn get_configuration() -> Result<ClientSettings, AppError> {
    service_core::config::load(Path::new(SETTINGS_FILE), false)
}
