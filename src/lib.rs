//! Turn TOML tunnel descriptions into ssh commands and register them with
//! supervisor, systemd, or run them in the foreground.

pub mod command;
pub mod config;
pub mod console;
pub mod error;
pub mod merge;
pub mod naming;
pub mod options;
pub mod ports;
pub mod register;
pub mod supervisor;
pub mod systemd;
pub mod tunnel;

pub use config::{load, load_all};
pub use command::render;
pub use error::{ConfigError, NamingError, PortsError, RenderError};
pub use tunnel::TunnelConfig;
