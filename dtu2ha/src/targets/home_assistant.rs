use log::{debug, warn};
use serde_derive::Serialize;

use crate::binary_sensor::BinarySensorState;
use crate::entity::{BinarySensorDeviceClass, BinarySensorEntityDescription, EntityCategory};
use crate::targets::entity_publisher::EntityPublisher;
use crate::targets::mqtt::{
    mqtt_config::MqttConfig,
    mqtt_wrapper::{MqttWrapper, QoS},
};

const PAYLOAD_ON: &str = "ON";
const PAYLOAD_OFF: &str = "OFF";
// resets an MQTT binary sensor to unknown
const PAYLOAD_UNKNOWN: &str = "None";

#[derive(Serialize)]
struct DeviceConfig<'a> {
    identifiers: Vec<&'a str>,
    name: &'a str,
    manufacturer: &'a str,
    model: &'a str,
}

#[derive(Serialize)]
struct BinarySensorConfig<'a> {
    name: &'a str,
    unique_id: String,
    object_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<BinarySensorDeviceClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_category: Option<EntityCategory>,
    state_topic: String,
    availability_topic: String,
    payload_on: &'a str,
    payload_off: &'a str,
    device: DeviceConfig<'a>,
}

/// Publishes entities through MQTT discovery.
pub struct HomeAssistant<MQTT: MqttWrapper> {
    client: MQTT,
    config: MqttConfig,
}

impl<MQTT: MqttWrapper> HomeAssistant<MQTT> {
    pub fn new(config: &MqttConfig) -> anyhow::Result<Self> {
        let client = MQTT::new(config)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn config_topic(&self, description: &BinarySensorEntityDescription) -> String {
        format!(
            "{}/binary_sensor/{}/config",
            self.config.discovery_prefix,
            description.unique_id()
        )
    }

    fn state_topic(&self, description: &BinarySensorEntityDescription) -> String {
        format!(
            "{}/dtu/{}/{}/state",
            self.config.base_topic,
            description.serial_number(),
            description.entity.translation_key
        )
    }

    fn publish(&mut self, topic: String, payload: String) {
        debug!("Publishing to {} value: {}", topic, payload);
        if let Err(e) = self.client.publish(topic, QoS::AtMostOnce, true, payload) {
            warn!("mqtt error: {e:?}")
        }
    }
}

impl<MQTT: MqttWrapper> EntityPublisher for HomeAssistant<MQTT> {
    fn publish_config(&mut self, description: &BinarySensorEntityDescription) {
        let serial_number = description.serial_number();
        let sensor_config = BinarySensorConfig {
            name: description.key(),
            unique_id: description.unique_id(),
            object_id: format!("{}_{}", serial_number, description.entity.translation_key)
                .to_lowercase(),
            device_class: description.device_class,
            entity_category: description.entity_category,
            state_topic: self.state_topic(description),
            availability_topic: self.config.status_topic(),
            payload_on: PAYLOAD_ON,
            payload_off: PAYLOAD_OFF,
            device: DeviceConfig {
                identifiers: vec![serial_number],
                name: self.config.device_name(serial_number),
                manufacturer: "Hoymiles",
                model: "DTU",
            },
        };

        let unique_id = description.unique_id();
        match serde_json::to_string(&sensor_config) {
            Ok(payload) => {
                let topic = self.config_topic(description);
                self.publish(topic, payload);
            }
            Err(e) => warn!("could not serialize config of {unique_id}: {e}"),
        }
    }

    fn publish_state(&mut self, state: &BinarySensorState) {
        let payload = match state.is_on {
            Some(true) => PAYLOAD_ON,
            Some(false) => PAYLOAD_OFF,
            None => PAYLOAD_UNKNOWN,
        };
        let topic = self.state_topic(&state.description);
        self.publish(topic, payload.to_string());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::BINARY_SENSORS;
    use crate::targets::mqtt::mqtt_config::SerialAlias;

    #[derive(Default)]
    struct RecordingMqtt {
        published: Vec<(String, QoS, bool, String)>,
    }

    impl MqttWrapper for RecordingMqtt {
        fn publish<S, V>(
            &mut self,
            topic: S,
            qos: QoS,
            retain: bool,
            payload: V,
        ) -> anyhow::Result<()>
        where
            S: Clone + Into<String>,
            V: Clone + Into<Vec<u8>>,
        {
            self.published.push((
                topic.into(),
                qos,
                retain,
                String::from_utf8(payload.into())?,
            ));
            Ok(())
        }

        fn new(_config: &MqttConfig) -> anyhow::Result<Self> {
            Ok(Self::default())
        }
    }

    fn home_assistant(aliases: &[(&str, &str)]) -> HomeAssistant<RecordingMqtt> {
        let config = MqttConfig {
            host: "localhost".into(),
            base_topic: "hoymiles_dtu".into(),
            discovery_prefix: "homeassistant".into(),
            client_id: "test".into(),
            serial_aliases: aliases
                .iter()
                .map(|(serial, alias)| SerialAlias {
                    serial: serial.to_string(),
                    alias: alias.to_string(),
                })
                .collect(),
            ..Default::default()
        };
        HomeAssistant::new(&config).unwrap()
    }

    #[test]
    fn test_publish_config() {
        let mut ha = home_assistant(&[]);
        let description = BINARY_SENSORS[0].with_serial_number("DTU123");

        ha.publish_config(&description);

        let (topic, qos, retain, payload) = &ha.client.published[0];
        assert_eq!(topic, "homeassistant/binary_sensor/DTU123_DTU/config");
        assert_eq!(*qos, QoS::AtMostOnce);
        assert!(*retain);

        let payload: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "name": "DTU",
                "unique_id": "DTU123_DTU",
                "object_id": "dtu123_dtu",
                "device_class": "connectivity",
                "entity_category": "diagnostic",
                "state_topic": "hoymiles_dtu/dtu/DTU123/dtu/state",
                "availability_topic": "hoymiles_dtu/status",
                "payload_on": "ON",
                "payload_off": "OFF",
                "device": {
                    "identifiers": ["DTU123"],
                    "name": "DTU123",
                    "manufacturer": "Hoymiles",
                    "model": "DTU",
                },
            })
        );
    }

    #[test]
    fn test_alias_names_device() {
        let mut ha = home_assistant(&[("DTU123", "Balcony")]);
        let description = BINARY_SENSORS[0].with_serial_number("DTU123");

        ha.publish_config(&description);

        let payload: serde_json::Value = serde_json::from_str(&ha.client.published[0].3).unwrap();
        assert_eq!(payload["device"]["name"], "Balcony");
        assert_eq!(payload["unique_id"], "DTU123_DTU");
    }

    #[test]
    fn test_publish_state() {
        let mut ha = home_assistant(&[]);
        let description = BINARY_SENSORS[0].with_serial_number("DTU123");

        for is_on in [Some(true), Some(false), None] {
            ha.publish_state(&BinarySensorState {
                description: description.clone(),
                is_on,
            });
        }

        let payloads: Vec<_> = ha
            .client
            .published
            .iter()
            .map(|(topic, _, retain, payload)| {
                assert_eq!(topic, "hoymiles_dtu/dtu/DTU123/dtu/state");
                assert!(*retain);
                payload.as_str()
            })
            .collect();
        assert_eq!(payloads, vec!["ON", "OFF", "None"]);
    }
}
