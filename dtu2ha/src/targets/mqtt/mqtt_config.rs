use rand::{distr::Alphanumeric, Rng};
use serde::Deserialize;

fn default_topic() -> String {
    "hoymiles_dtu".into()
}

fn default_discovery_prefix() -> String {
    "homeassistant".into()
}

fn default_client_id() -> String {
    format!(
        "dtu-bridge-{}",
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(5)
            .map(char::from)
            .collect::<String>()
    )
}

/// Friendly device name for a DTU serial.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SerialAlias {
    pub serial: String,
    pub alias: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: Option<bool>,
    #[serde(default = "default_topic")]
    pub base_topic: String,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub serial_aliases: Vec<SerialAlias>,
}

impl MqttConfig {
    pub fn status_topic(&self) -> String {
        format!("{}/status", self.base_topic)
    }

    /// Name Home Assistant shows for the device with `serial`. The first
    /// matching alias wins.
    pub fn device_name<'a>(&'a self, serial: &'a str) -> &'a str {
        self.serial_aliases
            .iter()
            .find(|alias| alias.serial == serial)
            .map_or(serial, |alias| alias.alias.as_str())
    }
}
