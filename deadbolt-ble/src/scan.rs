//! Lock discovery

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use deadbolt_proto::ble::SERVICE_UUID;

use crate::{BleError, parse_uuid};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A lock seen while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub id: String,
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

impl LockInfo {
    /// Case insensitive substring match on id, address or name. No filter
    /// matches every lock.
    pub fn matches(&self, filter: Option<&str>) -> bool {
        let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
            return true;
        };
        let filter = filter.to_lowercase();
        [Some(&self.id), Some(&self.address), self.name.as_ref()]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&filter))
    }
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.address,
            self.name.as_deref().unwrap_or("Unknown"),
            self.id
        )?;
        if let Some(rssi) = self.rssi {
            write!(f, " ({rssi} dBm)")?;
        }
        Ok(())
    }
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, BleError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(BleError::NoAdapter)
}

async fn start_scan() -> Result<Adapter, BleError> {
    let adapter = get_adapter().await?;
    let filter = ScanFilter {
        services: vec![parse_uuid(SERVICE_UUID)?],
    };
    adapter.start_scan(filter).await?;
    Ok(adapter)
}

async fn visible_locks(adapter: &Adapter) -> Result<Vec<(LockInfo, Peripheral)>, BleError> {
    let service = parse_uuid(SERVICE_UUID)?;
    let mut locks = Vec::new();
    for peripheral in adapter.peripherals().await? {
        let Some(props) = peripheral.properties().await? else {
            continue;
        };
        if !props.services.contains(&service) {
            continue;
        }
        let info = LockInfo {
            id: format!("{:?}", peripheral.id()),
            address: peripheral.address().to_string(),
            name: props.local_name,
            rssi: props.rssi,
        };
        locks.push((info, peripheral));
    }
    Ok(locks)
}

/// Scan until a lock matching `filter` shows up, for at most `timeout`.
pub async fn scan(filter: Option<&str>, timeout: Duration) -> Result<Peripheral, BleError> {
    let adapter = start_scan().await?;
    tracing::info!(filter, "scanning for lock");

    let found = tokio::time::timeout(timeout, async {
        loop {
            for (info, peripheral) in visible_locks(&adapter).await? {
                if info.matches(filter) {
                    tracing::info!(lock = %info, "found lock");
                    return Ok::<_, BleError>(peripheral);
                }
                tracing::debug!(lock = %info, "ignoring lock");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await;

    if let Err(e) = adapter.stop_scan().await {
        tracing::warn!("failed to stop scan: {e}");
    }
    match found {
        Ok(result) => result,
        Err(_) => Err(BleError::NotFound(filter.map(str::to_string), timeout)),
    }
}

/// Every lock seen within `duration`.
pub async fn list_locks(duration: Duration) -> Result<Vec<LockInfo>, BleError> {
    let adapter = start_scan().await?;
    tokio::time::sleep(duration).await;
    let locks = visible_locks(&adapter).await;
    adapter.stop_scan().await?;
    Ok(locks?.into_iter().map(|(info, _)| info).collect())
}
