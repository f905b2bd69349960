mod logging;
mod rumqttc_wrapper;

use anyhow::{ensure, Context};
use clap::{Parser, Subcommand};
use dtu2ha::binary_sensor::{self, BinarySensorState};
use dtu2ha::coordinator::Coordinator;
use dtu2ha::migration::{migrate_entry, ConfigEntryData, DtuIdentity, CONFIG_ENTRY_VERSION};
use dtu2ha::sources::dtu::{inverter_serial_number, Dtu};
use dtu2ha::sources::fake::{FakeDtu, FakeDtuConfig};
use dtu2ha::targets::entity_publisher::EntityPublisher;
use dtu2ha::targets::home_assistant::HomeAssistant;
use dtu2ha::targets::mqtt::mqtt_config::MqttConfig;
use rumqttc_wrapper::RumqttcWrapper;
use serde_derive::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::Duration;

use log::info;

// TODO: update once https://togithub.com/serde-rs/serde/issues/368 is closed
fn default_update_interval() -> u64 {
    30_500
}

#[derive(Debug, Deserialize)]
struct Config {
    dtu_host: String,
    #[serde(default = "default_update_interval")]
    update_interval: u64,
    /// Looked up from the DTU when missing
    dtu_serial_number: Option<String>,
    home_assistant: Option<MqttConfig>,
    fake: FakeDtuConfig,
}

#[derive(Subcommand, Default)]
enum Command {
    /// Publish the DTU connectivity to Home Assistant
    #[default]
    Run,
    /// Print the serial numbers reported by the DTU as config entry data
    Identify,
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = toml::from_str(contents).context("toml config unparsable")?;
    ensure!(config.update_interval > 0, "update_interval must be positive");
    Ok(config)
}

fn read_config(path: &Path) -> anyhow::Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("could not read config file {}", path.display()))?;
    parse_config(&contents)
        .with_context(|| format!("invalid config file {}", path.display()))
}

fn entry_data(config: &Config) -> ConfigEntryData {
    let mut entry = ConfigEntryData::new(&config.dtu_host);
    if let Some(dtu_serial_number) = &config.dtu_serial_number {
        entry.version = CONFIG_ENTRY_VERSION;
        entry.identity = Some(DtuIdentity {
            dtu_serial_number: dtu_serial_number.clone(),
            ..Default::default()
        });
    }
    entry
}

/// Config entry data of the DTU, as YAML.
async fn identify(config: &Config, dtu: &FakeDtu) -> anyhow::Result<String> {
    let entry = migrate_entry(
        dtu,
        ConfigEntryData::new(&config.dtu_host),
        &inverter_serial_number,
    )
    .await?;
    Ok(serde_yaml::to_string(&entry)?)
}

struct Bridge {
    coordinator: Coordinator<FakeDtu>,
    state_rx: Receiver<BinarySensorState>,
    output_channels: Vec<Box<dyn EntityPublisher>>,
}

impl Bridge {
    /// Finds out the DTU serial, creates its sensors and announces them on
    /// every output channel.
    async fn setup(
        config: &Config,
        dtu: FakeDtu,
        mut output_channels: Vec<Box<dyn EntityPublisher>>,
    ) -> anyhow::Result<Self> {
        let entry = migrate_entry(&dtu, entry_data(config), &inverter_serial_number)
            .await
            .context("could not determine the DTU serial number")?;
        let dtu_serial_number = entry
            .identity
            .map(|identity| identity.dtu_serial_number)
            .context("config entry without DTU serial number")?;
        info!("DTU serial number: {dtu_serial_number}");

        let dtu = Arc::new(Dtu::new(config.dtu_host.clone(), dtu));
        let update_interval = Duration::from_millis(config.update_interval);
        let mut coordinator = Coordinator::new(dtu, update_interval);

        let (state_tx, state_rx) = channel();
        let descriptions =
            binary_sensor::setup_entry(&dtu_serial_number, &mut coordinator, state_tx);

        for description in &descriptions {
            output_channels
                .iter_mut()
                .for_each(|channel| channel.publish_config(description));
        }

        Ok(Self {
            coordinator,
            state_rx,
            output_channels,
        })
    }

    /// Refreshes the DTU once and publishes whatever the sensors reported.
    async fn update(&mut self) {
        self.coordinator.refresh().await;

        for state in self.state_rx.try_iter() {
            self.output_channels
                .iter_mut()
                .for_each(|channel| channel.publish_state(&state));
        }
    }
}

async fn run(config: Config, dtu: FakeDtu) -> anyhow::Result<()> {
    let mut output_channels: Vec<Box<dyn EntityPublisher>> = Vec::new();
    if let Some(config) = &config.home_assistant {
        info!("Publishing to Home Assistant");
        output_channels.push(Box::new(HomeAssistant::<RumqttcWrapper>::new(config)?));
    }

    let mut bridge = Bridge::setup(&config, dtu, output_channels).await?;

    let mut interval = tokio::time::interval(bridge.coordinator.update_interval());
    loop {
        interval.tick().await;
        bridge.update().await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logging::init_logger();
    let args = Cli::parse();
    info!("Running revision: {}", env!("GIT_HASH"));

    let config = read_config(&args.config)?;
    info!("DTU host: {}", config.dtu_host);
    let dtu = FakeDtu::from(&config.fake);

    match args.command.unwrap_or_default() {
        Command::Run => run(config, dtu).await,
        Command::Identify => {
            print!("{}", identify(&config, &dtu).await?);
            Ok(())
        }
    }
}
