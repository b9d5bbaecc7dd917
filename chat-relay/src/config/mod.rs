use serde::Deserialize;
use service_core::config::ObservabilitySettings;
use service_core::error::AppError;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct UpstreamSettings {
    /// Origin every proxied path is forwarded to.
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,
    /// Path substring that forces streaming pass-through regardless of the
    /// upstream content type. Empty disables the path check.
    #[serde(default = "default_stream_path_marker")]
    pub stream_path_marker: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            stream_path_marker: default_stream_path_marker(),
        }
    }
}

fn default_upstream_base_url() -> String {
    "https://apis.scraponwheels.com/ecom/".to_string()
}

fn default_stream_path_marker() -> String {
    "chatbot/message".to_string()
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let base_path = std::env::current_dir()?;

    // Check if we're already in the chat-relay directory or need to navigate to it
    let configuration_directory = if base_path.ends_with("chat-relay") {
        base_path.join("config")
    } else {
        base_path.join("chat-relay").join("config")
    };

    service_core::config::load(&configuration_directory.join("base.yaml"), true)
}
