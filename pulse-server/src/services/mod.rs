pub mod heartbeat;
pub mod registration;
pub mod server;
pub mod store;
pub mod transport;
