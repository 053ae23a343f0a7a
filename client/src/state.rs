use std::sync::Arc;

use tracing::info;

use crate::api::ApiClient;
use crate::config::*;
use crate::identity::SessionStore;
use crate::input::Input;
use crate::multiplexer::{Multiplexer, MultiplexerSettings};
use crate::websocket::WebSocketConnector;

pub struct SessionState {
    pub config: Config,
    pub config_path: String,
    pub api: ApiClient,
    pub push: Multiplexer,
    pub seats: SessionStore,
    pub input: Input,
}

impl SessionState {
    pub fn new_with_config(config_path: &str) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load_from(config_path)?;

        let connector = Arc::new(WebSocketConnector::new(config.ws_base()));
        let settings = MultiplexerSettings {
            debounce: config.debounce(),
            reconnect_delay: config.reconnect_delay(),
        };

        Ok(SessionState {
            api: ApiClient::new(config.api_base()),
            push: Multiplexer::new(connector, settings),
            seats: SessionStore::open(&config.identity_path)?,
            input: Input::spawn()?,
            config,
            config_path: config_path.to_string(),
        })
    }

    /// Display name to use in rooms, asking once and remembering it
    pub async fn player_name(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        let default = self.config.player_name.clone().unwrap_or_else(|| "Player".to_string());
        let name = self
            .input
            .line_or("Your name", &default)
            .await
            .ok_or("Input closed")?;

        if self.config.player_name.as_deref() != Some(name.as_str()) {
            self.config.player_name = Some(name.clone());
            self.save_config()?;
        }
        Ok(name)
    }

    pub fn save_config(&self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        self.config.save_to(&self.config_path)
    }

    /// Close every push channel; called once on exit
    pub fn shutdown(&self) {
        info!("closing push channels {:?}", self.push.channels());
        self.push.disconnect(None);
    }
}
