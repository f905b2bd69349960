pub mod entity_publisher;
pub mod home_assistant;
pub mod mqtt;
