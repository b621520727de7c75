pub mod config;
pub mod email;
pub mod templates;

pub use config::*;
pub use email::*;
pub use templates::*;
