pub mod mqtt_config;
pub mod mqtt_wrapper;
