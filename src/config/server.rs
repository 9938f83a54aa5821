use serde::{Deserialize, Serialize};
use validator::Validate;

/// Health endpoint listener.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Serves `GET /health` when true.
    pub enabled: bool,

    #[validate(length(min = 1, message = "Server host must not be empty"))]
    pub host: String,

    #[validate(range(min = 1, message = "Server port must not be 0"))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
