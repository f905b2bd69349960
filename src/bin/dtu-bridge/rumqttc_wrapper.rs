use std::{thread, time::Duration};

use anyhow::Context;
use dtu2ha::targets::mqtt::{mqtt_config::MqttConfig, mqtt_wrapper};
use log::{debug, warn};
use rumqttc::{
    tokio_rustls::rustls::{ClientConfig, RootCertStore},
    Client, MqttOptions, Transport,
};

pub struct RumqttcWrapper {
    client: Client,
}

fn match_qos(qos: mqtt_wrapper::QoS) -> rumqttc::QoS {
    match qos {
        mqtt_wrapper::QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        mqtt_wrapper::QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        mqtt_wrapper::QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

fn tls_transport() -> Transport {
    let mut roots = RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();
    for e in native_certs.errors {
        warn!("could not load platform cert: {e}");
    }
    for cert in native_certs.certs {
        if let Err(e) = roots.add(cert) {
            warn!("skipping platform cert: {e}");
        }
    }

    let client_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Transport::tls_with_config(client_config.into())
}

impl mqtt_wrapper::MqttWrapper for RumqttcWrapper {
    fn publish<S, V>(
        &mut self,
        topic: S,
        qos: mqtt_wrapper::QoS,
        retain: bool,
        payload: V,
    ) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>,
    {
        Ok(self.client.publish(topic, match_qos(qos), retain, payload)?)
    }

    fn new(config: &MqttConfig) -> anyhow::Result<Self> {
        let use_tls = config.tls.is_some_and(|tls| tls);

        let mut mqttoptions = MqttOptions::new(
            &config.client_id,
            &config.host,
            config.port.unwrap_or(if use_tls { 8883 } else { 1883 }),
        );
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if use_tls {
            mqttoptions.set_transport(tls_transport());
        }

        // a password without a user name is ignored
        if let Some(username) = &config.username {
            let password = config.password.clone().unwrap_or_default();
            mqttoptions.set_credentials(username.clone(), password);
        }
        let status_topic = config.status_topic();

        mqttoptions.set_last_will(rumqttc::LastWill::new(
            &status_topic,
            "offline",
            rumqttc::QoS::ExactlyOnce,
            true,
        ));

        let (client, mut connection) = Client::new(mqttoptions, 512);

        // Birth message
        client
            .publish(&status_topic, rumqttc::QoS::ExactlyOnce, true, "online")
            .context("could not queue birth message")?;

        thread::spawn(move || {
            // outgoing messages only leave while the event loop is polled.
            // iter() blocks and ends once the client is gone
            for event in connection.iter() {
                if let Err(e) = event {
                    debug!("mqtt connection: {e}");
                    thread::sleep(Duration::from_secs(1));
                }
            }
        });
        Ok(Self { client })
    }
}
