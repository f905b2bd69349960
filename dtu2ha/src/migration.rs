//! Recovers the serial numbers of a DTU and its inverters so that config
//! entries created before they were stored can be upgraded.

use log::{debug, info};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use crate::sources::dtu::{DtuConnector, DtuSession, SerialNormalizer};

pub const CONFIG_ENTRY_VERSION: u32 = 2;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MigrationError {
    #[error("cannot connect to DTU at {0}")]
    CannotConnect(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub inverter_serial_number: String,
    pub port_number: u32,
}

/// Identifying data of a DTU in the shape config entries store it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtuIdentity {
    pub dtu_serial_number: String,
    pub inverters: Vec<String>,
    pub ports: Vec<PortBinding>,
}

/// Queries the DTU at `host` once and reshapes its real data response.
///
/// The DTU serial is taken as is, inverter and port serials go through
/// `normalize`. Both lists keep the order of the response.
pub async fn resolve_identity<C, N>(
    connector: &C,
    host: &str,
    normalize: &N,
) -> Result<DtuIdentity, MigrationError>
where
    C: DtuConnector,
    N: SerialNormalizer + ?Sized,
{
    let mut session = connector.connect(host);
    let real_data = session
        .real_data()
        .await
        .ok_or_else(|| MigrationError::CannotConnect(host.to_string()))?;

    let inverters = real_data
        .sgs_data
        .iter()
        .map(|sgs| normalize.normalize(&sgs.serial_number))
        .collect();

    let ports = real_data
        .pv_data
        .iter()
        .map(|pv| PortBinding {
            inverter_serial_number: normalize.normalize(&pv.serial_number),
            port_number: pv.port_number,
        })
        .collect();

    let identity = DtuIdentity {
        dtu_serial_number: real_data.device_serial_number,
        inverters,
        ports,
    };
    debug!("resolved identity for {host}: {identity:?}");
    Ok(identity)
}

/// Data stored with a config entry. Version 1 entries only know the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntryData {
    pub version: u32,
    pub host: String,
    #[serde(flatten)]
    pub identity: Option<DtuIdentity>,
}

impl ConfigEntryData {
    pub fn new(host: &str) -> Self {
        Self {
            version: 1,
            host: host.to_string(),
            identity: None,
        }
    }
}

/// Brings a config entry up to [`CONFIG_ENTRY_VERSION`]. Entries that are
/// current already are returned without talking to the DTU.
pub async fn migrate_entry<C, N>(
    connector: &C,
    entry: ConfigEntryData,
    normalize: &N,
) -> Result<ConfigEntryData, MigrationError>
where
    C: DtuConnector,
    N: SerialNormalizer + ?Sized,
{
    if entry.version >= CONFIG_ENTRY_VERSION {
        return Ok(entry);
    }

    info!(
        "migrating config entry for {} from version {}",
        entry.host, entry.version
    );
    let identity = resolve_identity(connector, &entry.host, normalize).await?;

    Ok(ConfigEntryData {
        version: CONFIG_ENTRY_VERSION,
        identity: Some(identity),
        ..entry
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sources::dtu::{PvData, RealData, SgsData};
    use crate::sources::fake::FakeDtu;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sgs(serial_number: &str) -> SgsData {
        SgsData {
            serial_number: serial_number.into(),
        }
    }

    fn pv(serial_number: &str, port_number: u32) -> PvData {
        PvData {
            serial_number: serial_number.into(),
            port_number,
        }
    }

    fn binding(serial: &str, port_number: u32) -> PortBinding {
        PortBinding {
            inverter_serial_number: serial.into(),
            port_number,
        }
    }

    /// Never answers and counts how often it was asked.
    #[derive(Default)]
    struct SilentDtu {
        connects: AtomicUsize,
    }

    struct SilentSession;

    #[async_trait]
    impl DtuSession for SilentSession {
        async fn real_data(&mut self) -> Option<RealData> {
            None
        }
    }

    impl DtuConnector for SilentDtu {
        type Session = SilentSession;

        fn connect(&self, _host: &str) -> SilentSession {
            self.connects.fetch_add(1, Ordering::Relaxed);
            SilentSession
        }
    }

    #[tokio::test]
    async fn test_resolve_identity() {
        let dtu = FakeDtu::from(RealData {
            device_serial_number: "DTU123".into(),
            sgs_data: vec![sgs("a1"), sgs("a2")],
            pv_data: vec![pv("a1", 0), pv("a1", 1)],
        });

        let identity = resolve_identity(&dtu, "dtu.local", &str::to_uppercase)
            .await
            .unwrap();

        assert_eq!(identity.dtu_serial_number, "DTU123");
        assert_eq!(identity.inverters, vec!["A1", "A2"]);
        assert_eq!(identity.ports, vec![binding("A1", 0), binding("A1", 1)]);
    }

    #[tokio::test]
    async fn test_dtu_serial_is_not_normalized() {
        let dtu = FakeDtu::new("dtu-lower");

        let identity = resolve_identity(&dtu, "dtu.local", &str::to_uppercase)
            .await
            .unwrap();

        assert_eq!(identity.dtu_serial_number, "dtu-lower");
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let dtu = FakeDtu::new("DTU123");

        let identity = resolve_identity(&dtu, "dtu.local", &str::to_uppercase)
            .await
            .unwrap();

        assert_eq!(
            identity,
            DtuIdentity {
                dtu_serial_number: "DTU123".into(),
                inverters: vec![],
                ports: vec![],
            }
        );
    }

    #[tokio::test]
    async fn test_no_snapshot() {
        let dtu = SilentDtu::default();

        let res = resolve_identity(&dtu, "10.0.0.7", &str::to_uppercase).await;

        assert_eq!(res, Err(MigrationError::CannotConnect("10.0.0.7".into())));
        assert_eq!(dtu.connects.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_overlapping_serials_are_normalized_alike() {
        let dtu = FakeDtu::from(RealData {
            device_serial_number: "DTU123".into(),
            sgs_data: vec![sgs("116491234567"), sgs("7")],
            pv_data: vec![pv("7", 3), pv("116491234567", 0)],
        });

        let identity = resolve_identity(
            &dtu,
            "dtu.local",
            &crate::sources::dtu::inverter_serial_number,
        )
        .await
        .unwrap();

        assert_eq!(identity.inverters, vec!["1b1f6b2d07", "7"]);
        assert_eq!(identity.ports, vec![binding("7", 3), binding("1b1f6b2d07", 0)]);
    }

    #[tokio::test]
    async fn test_migrate_v1_entry() {
        let dtu = FakeDtu::from(RealData {
            device_serial_number: "DTU123".into(),
            sgs_data: vec![sgs("a1")],
            pv_data: vec![pv("a1", 0)],
        });

        let entry = migrate_entry(&dtu, ConfigEntryData::new("dtu.local"), &str::to_uppercase)
            .await
            .unwrap();

        assert_eq!(entry.version, CONFIG_ENTRY_VERSION);
        assert_eq!(entry.host, "dtu.local");
        let identity = entry.identity.unwrap();
        assert_eq!(identity.inverters, vec!["A1"]);
        assert_eq!(identity.ports, vec![binding("A1", 0)]);
    }

    #[tokio::test]
    async fn test_migrate_current_entry_is_untouched() {
        let dtu = SilentDtu::default();
        let entry = ConfigEntryData {
            version: CONFIG_ENTRY_VERSION,
            host: "dtu.local".into(),
            identity: Some(DtuIdentity {
                dtu_serial_number: "DTU123".into(),
                ..Default::default()
            }),
        };

        let migrated = migrate_entry(&dtu, entry.clone(), &str::to_uppercase)
            .await
            .unwrap();

        assert_eq!(migrated, entry);
        assert_eq!(dtu.connects.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_migrate_unreachable_entry() {
        let dtu = SilentDtu::default();

        let res = migrate_entry(&dtu, ConfigEntryData::new("dtu.local"), &str::to_uppercase).await;

        assert_eq!(res, Err(MigrationError::CannotConnect("dtu.local".into())));
    }

    #[test]
    fn test_entry_data_shape() {
        let entry = ConfigEntryData {
            version: 2,
            host: "dtu.local".into(),
            identity: Some(DtuIdentity {
                dtu_serial_number: "DTU123".into(),
                inverters: vec!["a1".into()],
                ports: vec![binding("a1", 0)],
            }),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "version": 2,
                "host": "dtu.local",
                "dtu_serial_number": "DTU123",
                "inverters": ["a1"],
                "ports": [{"inverter_serial_number": "a1", "port_number": 0}],
            })
        );

        let v1 = serde_json::json!({"version": 1, "host": "dtu.local"});
        let v1: ConfigEntryData = serde_json::from_value(v1).unwrap();
        assert_eq!(v1, ConfigEntryData::new("dtu.local"));
    }
}
