use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{debug, warn};

use crate::sources::dtu::{Dtu, DtuConnector, RealData};

/// Something that wants to hear about every finished refresh.
pub trait CoordinatorListener {
    fn handle_coordinator_update(&mut self);
}

/// Polls a DTU and tells its listeners whenever a refresh finished, whether or
/// not the DTU answered.
pub struct Coordinator<C: DtuConnector> {
    dtu: Arc<Dtu<C>>,
    update_interval: Duration,
    listeners: Vec<Box<dyn CoordinatorListener>>,
    data: Option<RealData>,
    last_update_success: bool,
    last_update_success_time: Option<DateTime<Local>>,
}

impl<C: DtuConnector> Coordinator<C> {
    pub fn new(dtu: Arc<Dtu<C>>, update_interval: Duration) -> Self {
        Self {
            dtu,
            update_interval,
            listeners: Vec::new(),
            data: None,
            last_update_success: false,
            last_update_success_time: None,
        }
    }

    pub fn dtu(&self) -> Arc<Dtu<C>> {
        Arc::clone(&self.dtu)
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn add_listener(&mut self, listener: Box<dyn CoordinatorListener>) {
        self.listeners.push(listener);
    }

    pub fn data(&self) -> Option<&RealData> {
        self.data.as_ref()
    }

    pub fn last_update_success(&self) -> bool {
        self.last_update_success
    }

    pub fn last_update_success_time(&self) -> Option<DateTime<Local>> {
        self.last_update_success_time
    }

    pub async fn refresh(&mut self) {
        self.data = self.dtu.real_data().await;
        self.last_update_success = self.data.is_some();

        if self.last_update_success {
            let now = Local::now();
            debug!(
                "refreshed DTU {} at {}",
                self.dtu.host(),
                now.format("%Y-%m-%d %H:%M:%S")
            );
            self.last_update_success_time = Some(now);
        } else {
            warn!("no data from DTU {}", self.dtu.host());
        }

        self.listeners
            .iter_mut()
            .for_each(|listener| listener.handle_coordinator_update());
    }
}
