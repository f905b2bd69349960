use serde_derive::Serialize;

/// Classification of a non-primary entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Config,
    Diagnostic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinarySensorDeviceClass {
    Connectivity,
    Problem,
    Running,
}

/// Fields every entity of a DTU device shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescription {
    pub key: &'static str,
    pub translation_key: &'static str,
    pub serial_number: String,
    pub is_dtu_sensor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySensorEntityDescription {
    pub entity: EntityDescription,
    pub device_class: Option<BinarySensorDeviceClass>,
    pub entity_category: Option<EntityCategory>,
}

impl BinarySensorEntityDescription {
    /// Copy of this description bound to the device with `serial_number`.
    pub fn with_serial_number(&self, serial_number: &str) -> Self {
        Self {
            entity: EntityDescription {
                serial_number: serial_number.to_string(),
                ..self.entity.clone()
            },
            ..self.clone()
        }
    }

    pub fn key(&self) -> &'static str {
        self.entity.key
    }

    pub fn serial_number(&self) -> &str {
        &self.entity.serial_number
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.entity.serial_number, self.entity.key)
    }
}

/// Binary sensors created for every configured DTU. The serial number is
/// filled in per config entry.
pub static BINARY_SENSORS: [BinarySensorEntityDescription; 1] = [BinarySensorEntityDescription {
    entity: EntityDescription {
        key: "DTU",
        translation_key: "dtu",
        serial_number: String::new(),
        is_dtu_sensor: true,
    },
    device_class: Some(BinarySensorDeviceClass::Connectivity),
    entity_category: Some(EntityCategory::Diagnostic),
}];
