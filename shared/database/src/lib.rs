pub mod models;
pub mod connection;
pub mod migrations;
pub mod wallet;
pub mod notifications;
pub mod audit;

pub use models::*;
pub use connection::*;
pub use migrations::*;
