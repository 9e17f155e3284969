use std::sync::Arc;
use std::time::Duration;

use deadbolt_ble::BleTransport;
use deadbolt_lock::{Config, ConfigError, Lock, LockError, Operation, Transport};

const DISCOVERY_RETRY: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum UnlockError {
    #[error("no lock discovered yet")]
    NoLock,
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// The one lock the hub serves, once discovery has found it.
///
/// Requests take turns on it: the mutex is held for a whole connect, unlock,
/// disconnect cycle.
pub struct Hub<T: Transport> {
    lock: tokio::sync::Mutex<Option<Lock<T>>>,
}

impl<T: Transport> Hub<T> {
    pub fn new() -> Self {
        Self {
            lock: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn publish(&self, lock: Lock<T>) {
        *self.lock.lock().await = Some(lock);
    }

    pub async fn is_ready(&self) -> bool {
        self.lock.lock().await.is_some()
    }

    pub async fn unlock(&self) -> Result<(), UnlockError> {
        let mut guard = self.lock.lock().await;
        let lock = guard.as_mut().ok_or(UnlockError::NoLock)?;
        lock.run(Operation::Unlock).await?;
        Ok(())
    }
}

impl<T: Transport> Default for Hub<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan until the configured lock shows up, then publish it to `hub`.
pub async fn discover(config: Config, hub: Arc<Hub<BleTransport>>) -> Result<(), ConfigError> {
    let lock_config = config.lock_config()?;
    let peripheral = loop {
        match deadbolt_ble::scan(config.lock_uuid.as_deref(), config.scan_timeout()).await {
            Ok(peripheral) => break peripheral,
            Err(e) => {
                tracing::warn!("lock discovery failed, retrying: {e}");
                tokio::time::sleep(DISCOVERY_RETRY).await;
            }
        }
    };

    let lock = Lock::new(Arc::new(BleTransport::new(peripheral)), lock_config);
    hub.publish(lock).await;
    tracing::info!("lock ready");
    Ok(())
}
