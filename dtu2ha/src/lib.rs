// externally visible interfaces
pub mod binary_sensor;
pub mod coordinator;
pub mod entity;
pub mod migration;
pub mod sources;
pub mod targets;
