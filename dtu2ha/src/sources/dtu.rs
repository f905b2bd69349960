use async_trait::async_trait;
use log::info;
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum NetworkState {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl From<u8> for NetworkState {
    /// Raw state codes as reported by the device library. Anything it does not
    /// know about is treated as unknown.
    fn from(code: u8) -> Self {
        match code {
            1 => NetworkState::Online,
            2 => NetworkState::Offline,
            _ => NetworkState::Unknown,
        }
    }
}

/// Inverter ("SGS") record of a real data snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SgsData {
    pub serial_number: String,
}

/// Per port photovoltaic record of a real data snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PvData {
    pub serial_number: String,
    pub port_number: u32,
}

/// The parts of a DTU real data response this crate consumes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RealData {
    pub device_serial_number: String,
    pub sgs_data: Vec<SgsData>,
    pub pv_data: Vec<PvData>,
}

/// Read access to the last known network state of a DTU.
pub trait DtuStateSource {
    fn network_state(&self) -> NetworkState;
}

// The DTU wire protocol lives behind these two traits. Implementations own
// their timeouts and retries.
pub trait DtuConnector: Send + Sync {
    type Session: DtuSession;

    fn connect(&self, host: &str) -> Self::Session;
}

#[async_trait]
pub trait DtuSession: Send {
    /// Requests a full real data snapshot. `None` if the device did not answer
    /// with usable data.
    async fn real_data(&mut self) -> Option<RealData>;
}

/// Turns a raw serial as found in a snapshot into its canonical form.
pub trait SerialNormalizer {
    fn normalize(&self, raw: &str) -> String;
}

impl<F> SerialNormalizer for F
where
    F: Fn(&str) -> String,
{
    fn normalize(&self, raw: &str) -> String {
        self(raw)
    }
}

/// Inverter serials are transported as decimal integers and displayed as hex.
/// Values that are not decimal are assumed to be formatted already.
pub fn inverter_serial_number(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<u64>() {
        Ok(serial) => format!("{serial:x}"),
        Err(_) => raw.to_lowercase(),
    }
}

/// Device handle: remembers whether the last exchange with the DTU worked.
pub struct Dtu<C: DtuConnector> {
    host: String,
    connector: C,
    state: Mutex<NetworkState>,
}

impl<C: DtuConnector> Dtu<C> {
    pub fn new(host: impl Into<String>, connector: C) -> Self {
        Self {
            host: host.into(),
            connector,
            state: Mutex::new(NetworkState::Unknown),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn set_state(&self, new_state: NetworkState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != new_state {
            *state = new_state;
            info!("DTU {} is {new_state:?}", self.host);
        }
    }

    pub async fn real_data(&self) -> Option<RealData> {
        let mut session = self.connector.connect(&self.host);
        let real_data = session.real_data().await;

        self.set_state(if real_data.is_some() {
            NetworkState::Online
        } else {
            NetworkState::Offline
        });
        real_data
    }
}

impl<C: DtuConnector> DtuStateSource for Dtu<C> {
    fn network_state(&self) -> NetworkState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
