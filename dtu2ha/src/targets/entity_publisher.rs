use crate::binary_sensor::BinarySensorState;
use crate::entity::BinarySensorEntityDescription;

pub trait EntityPublisher {
    /// Announces an entity to the platform.
    fn publish_config(&mut self, description: &BinarySensorEntityDescription);

    fn publish_state(&mut self, state: &BinarySensorState);
}
