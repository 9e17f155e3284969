use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use deadbolt_lock::{Endpoint, Notifications, Transport, TransportError};
use deadbolt_proto::ble::{
    READ_UUID, SECURE_READ_UUID, SECURE_WRITE_UUID, SERVICE_UUID, WRITE_UUID,
};
use futures::StreamExt;

use crate::parse_uuid;

const ENDPOINTS: [(Endpoint, &str); 4] = [
    (Endpoint::PlainWrite, WRITE_UUID),
    (Endpoint::PlainRead, READ_UUID),
    (Endpoint::SecureWrite, SECURE_WRITE_UUID),
    (Endpoint::SecureRead, SECURE_READ_UUID),
];

/// Commands go out as ATT write requests; the lock acknowledges each one.
const COMMAND_WRITE: WriteType = WriteType::WithResponse;

/// [`Transport`] over a lock's GATT command service.
pub struct BleTransport {
    peripheral: Peripheral,
    characteristics: Mutex<HashMap<Endpoint, Characteristic>>,
}

impl BleTransport {
    pub fn new(peripheral: Peripheral) -> Self {
        Self {
            peripheral,
            characteristics: Mutex::new(HashMap::new()),
        }
    }

    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    fn characteristic(&self, endpoint: Endpoint) -> Option<Characteristic> {
        self.characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&endpoint)
            .cloned()
    }

    async fn resolve(&self) -> Result<HashMap<Endpoint, Characteristic>, TransportError> {
        self.peripheral
            .discover_services()
            .await
            .map_err(connect_error)?;

        let service_uuid = parse_uuid(SERVICE_UUID).map_err(connect_error)?;
        let services: Vec<_> = self
            .peripheral
            .services()
            .into_iter()
            .filter(|s| s.uuid == service_uuid)
            .collect();
        let [service] = services.as_slice() else {
            return Err(TransportError::Connect(format!(
                "expected one lock service, found {}",
                services.len()
            )));
        };

        let mut resolved = HashMap::new();
        for (endpoint, uuid) in ENDPOINTS {
            let uuid = parse_uuid(uuid).map_err(connect_error)?;
            let characteristic = service
                .characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .ok_or_else(|| {
                    TransportError::Connect(format!("{endpoint} characteristic not found"))
                })?;
            resolved.insert(endpoint, characteristic.clone());
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        tracing::info!(address = %self.peripheral.address(), "connecting");
        let connected = self
            .peripheral
            .is_connected()
            .await
            .map_err(connect_error)?;
        if !connected {
            self.peripheral
                .connect()
                .await
                .map_err(connect_error)?;
        }

        let resolved = self.resolve().await?;
        *self
            .characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = resolved;
        tracing::debug!("lock service resolved");
        Ok(())
    }

    async fn subscribe(&self, endpoint: Endpoint) -> Result<Notifications, TransportError> {
        let subscribe_error = |reason: String| TransportError::Subscribe { endpoint, reason };
        let characteristic = self
            .characteristic(endpoint)
            .ok_or_else(|| subscribe_error("not connected".to_string()))?;

        // the stream has to exist before notifications are switched on
        let notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| subscribe_error(e.to_string()))?;
        self.peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| subscribe_error(e.to_string()))?;

        let uuid = characteristic.uuid;
        let frames = notifications.filter_map(move |notification| async move {
            (notification.uuid == uuid).then_some(notification.value)
        });
        Ok(Box::pin(frames))
    }

    async fn write(&self, endpoint: Endpoint, data: &[u8]) -> Result<(), TransportError> {
        let characteristic = self.characteristic(endpoint).ok_or(TransportError::Write {
            endpoint,
            reason: "not connected".to_string(),
        })?;
        self.peripheral
            .write(&characteristic, data, COMMAND_WRITE)
            .await
            .map_err(|e| TransportError::Write {
                endpoint,
                reason: e.to_string(),
            })
    }

    async fn disconnect(&self) {
        self.characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        match self.peripheral.is_connected().await {
            Ok(false) => {}
            _ => {
                if let Err(e) = self.peripheral.disconnect().await {
                    tracing::warn!("disconnect failed: {e}");
                }
            }
        }
        tracing::info!("disconnected");
    }
}

fn connect_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Connect(e.to_string())
}
