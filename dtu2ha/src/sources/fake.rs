use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::debug;
use serde_derive::Deserialize;

use super::dtu::{DtuConnector, DtuSession, PvData, RealData, SgsData};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FakePortConfig {
    pub serial_number: String,
    pub port_number: u32,
}

/// Describes what a fake DTU reports. Serials are given in their raw form.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FakeDtuConfig {
    pub dtu_serial_number: String,
    #[serde(default)]
    pub inverters: Vec<String>,
    #[serde(default)]
    pub ports: Vec<FakePortConfig>,
    #[serde(default)]
    pub offline: bool,
}

/// A DTU that answers every request from memory, or never when offline.
pub struct FakeDtu {
    real_data: RealData,
    offline: AtomicBool,
}

impl FakeDtu {
    pub fn new(dtu_serial_number: &str) -> Self {
        Self::from(RealData {
            device_serial_number: dtu_serial_number.to_string(),
            ..Default::default()
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }
}

impl From<RealData> for FakeDtu {
    fn from(real_data: RealData) -> Self {
        Self {
            real_data,
            offline: AtomicBool::new(false),
        }
    }
}

impl From<&FakeDtuConfig> for FakeDtu {
    fn from(config: &FakeDtuConfig) -> Self {
        let fake = Self::from(RealData {
            device_serial_number: config.dtu_serial_number.clone(),
            sgs_data: config
                .inverters
                .iter()
                .map(|serial_number| SgsData {
                    serial_number: serial_number.clone(),
                })
                .collect(),
            pv_data: config
                .ports
                .iter()
                .map(|port| PvData {
                    serial_number: port.serial_number.clone(),
                    port_number: port.port_number,
                })
                .collect(),
        });
        fake.set_offline(config.offline);
        fake
    }
}

pub struct FakeSession {
    real_data: Option<RealData>,
}

impl DtuConnector for FakeDtu {
    type Session = FakeSession;

    fn connect(&self, host: &str) -> FakeSession {
        let offline = self.offline.load(Ordering::Relaxed);
        debug!("fake DTU session to {host}, offline: {offline}");
        FakeSession {
            real_data: (!offline).then(|| self.real_data.clone()),
        }
    }
}

#[async_trait]
impl DtuSession for FakeSession {
    async fn real_data(&mut self) -> Option<RealData> {
        self.real_data.take()
    }
}
