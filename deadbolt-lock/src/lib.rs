//! Driving a lock over a notify/write transport
//!
//! [`Lock`] owns one [`Session`] per [`deadbolt_proto::Channel`] and runs the
//! handshake that keys them. The link itself is abstracted behind
//! [`Transport`], implemented over BLE by `deadbolt-ble`.

mod config;
mod error;
mod lock;
mod session;
mod transport;

pub use config::{CONFIG_ENV, CONFIG_FILE_NAME, Config, ConfigError};
pub use error::{LockError, TransportError};
pub use lock::{Lock, LockConfig, LockState, Operation};
pub use session::Session;
pub use transport::{Endpoint, Notifications, Transport};
