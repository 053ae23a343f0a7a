use serde::{Deserialize, Serialize};
use std::path::Path;
use std::fs;
use std::time::Duration;

pub const API_URL_ENV: &str = "DUEL_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub identity_path: String,
    pub player_name: Option<String>,
    pub debounce_ms: u64,
    pub reconnect_delay_ms: u64,
    pub ai_think_ms: u64,
    /// Status poll while another participant holds the turn
    pub poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: "http://localhost:8000".to_string(),
            identity_path: "sessions.json".to_string(),
            player_name: None,
            debounce_ms: 120,
            reconnect_delay_ms: 3000,
            ai_think_ms: 1000,
            poll_ms: 2000,
        }
    }
}

impl Config {
    pub fn load_from(config_path: &str) -> std::result::Result<Config, Box<dyn std::error::Error>> {
        let mut config = if Path::new(config_path).exists() {
            let content = fs::read_to_string(config_path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.server_url = url;
        }
        Ok(config)
    }

    pub fn save_to(&self, config_path: &str) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content)?;
        Ok(())
    }

    /// REST base, e.g. `http://localhost:8000/api`
    pub fn api_base(&self) -> String {
        format!("{}/api", self.server_url.trim_end_matches('/'))
    }

    /// Push base, e.g. `ws://localhost:8000/ws`
    pub fn ws_base(&self) -> String {
        let url = self.server_url.trim_end_matches('/');
        let url = if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{url}")
        };
        format!("{url}/ws")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn ai_think(&self) -> Duration {
        Duration::from_millis(self.ai_think_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_base_follows_scheme() {
        let mut config = Config::default();
        assert_eq!(config.ws_base(), "ws://localhost:8000/ws");
        assert_eq!(config.api_base(), "http://localhost:8000/api");

        config.server_url = "https://duel.example.com/".to_string();
        assert_eq!(config.ws_base(), "wss://duel.example.com/ws");
        assert_eq!(config.api_base(), "https://duel.example.com/api");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"debounce_ms": 50}"#).unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(50));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
    }
}
