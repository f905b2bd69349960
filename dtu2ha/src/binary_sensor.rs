use std::sync::mpsc::Sender;
use std::sync::Arc;

use log::{debug, warn};

use crate::coordinator::{Coordinator, CoordinatorListener};
use crate::entity::{BinarySensorEntityDescription, BINARY_SENSORS};
use crate::sources::dtu::{DtuConnector, DtuStateSource, NetworkState};

/// State of a binary sensor as handed to the targets. `None` is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySensorState {
    pub description: BinarySensorEntityDescription,
    pub is_on: Option<bool>,
}

pub fn is_on(state: NetworkState) -> Option<bool> {
    match state {
        NetworkState::Online => Some(true),
        NetworkState::Offline => Some(false),
        _ => None,
    }
}

/// Mirrors the network state of a DTU.
pub struct DtuConnectivitySensor<H: DtuStateSource> {
    description: BinarySensorEntityDescription,
    dtu: Arc<H>,
    is_on: Option<bool>,
    state_tx: Sender<BinarySensorState>,
}

impl<H: DtuStateSource> DtuConnectivitySensor<H> {
    pub fn new(
        description: BinarySensorEntityDescription,
        dtu: Arc<H>,
        state_tx: Sender<BinarySensorState>,
    ) -> Self {
        let is_on = is_on(dtu.network_state());
        Self {
            description,
            dtu,
            is_on,
            state_tx,
        }
    }

    pub fn description(&self) -> &BinarySensorEntityDescription {
        &self.description
    }

    pub fn is_on(&self) -> Option<bool> {
        self.is_on
    }

    fn update_state_value(&mut self) {
        self.is_on = is_on(self.dtu.network_state());
    }
}

impl<H: DtuStateSource> CoordinatorListener for DtuConnectivitySensor<H> {
    fn handle_coordinator_update(&mut self) {
        self.update_state_value();
        debug!("{} is {:?}", self.description.unique_id(), self.is_on);

        let state = BinarySensorState {
            description: self.description.clone(),
            is_on: self.is_on,
        };
        if let Err(e) = self.state_tx.send(state) {
            warn!("dropping state of {}: {e}", self.description.unique_id());
        }
    }
}

/// Creates the binary sensors of the DTU with `dtu_serial_number` and hooks
/// them up to `coordinator`.
pub fn setup_entry<C>(
    dtu_serial_number: &str,
    coordinator: &mut Coordinator<C>,
    state_tx: Sender<BinarySensorState>,
) -> Vec<BinarySensorEntityDescription>
where
    C: DtuConnector + 'static,
{
    BINARY_SENSORS
        .iter()
        .map(|description| {
            let description = description.with_serial_number(dtu_serial_number);
            let sensor = DtuConnectivitySensor::new(
                description.clone(),
                coordinator.dtu(),
                state_tx.clone(),
            );
            coordinator.add_listener(Box::new(sensor));
            description
        })
        .collect()
}
