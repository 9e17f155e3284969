//! Deadbolt BLE
//!
//! Finds locks by their GATT service and carries lock sessions over btleplug.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use deadbolt_ble::BleTransport;
//! use deadbolt_lock::{Config, Lock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let peripheral = deadbolt_ble::scan(config.lock_uuid.as_deref(), config.scan_timeout()).await?;
//!
//!     let mut lock = Lock::new(Arc::new(BleTransport::new(peripheral)), config.lock_config()?);
//!     lock.connect().await?;
//!     let result = lock.unlock().await;
//!     lock.disconnect().await?;
//!     result?;
//!     Ok(())
//! }
//! ```

mod error;
mod scan;
mod transport;

pub use error::BleError;
pub use scan::{LockInfo, get_adapter, list_locks, scan};
pub use transport::BleTransport;

pub use btleplug::platform::Peripheral;

fn parse_uuid(s: &str) -> Result<uuid::Uuid, BleError> {
    uuid::Uuid::parse_str(s).map_err(|e| BleError::Uuid(s.to_string(), e))
}
