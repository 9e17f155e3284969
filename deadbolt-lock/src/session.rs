//! Session: one command channel bound to its write/notify endpoint pair

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use deadbolt_proto::{Channel, CipherChannel, Frame, Key};
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{Endpoint, LockError, Notifications, Transport, TransportError};

type Pending = Arc<Mutex<Option<oneshot::Sender<Frame>>>>;
type SharedCipher = Arc<Mutex<Option<CipherChannel>>>;

/// Request/response execution over a notification based transport.
///
/// The cipher is shared with the notification listener, which deciphers every
/// inbound frame as it arrives. At most one command is in flight at a time.
pub struct Session<T: Transport> {
    channel: Channel,
    transport: Arc<T>,
    cipher: SharedCipher,
    pending: Pending,
    listener: Option<JoinHandle<()>>,
    response_timeout: Duration,
}

impl<T: Transport> Session<T> {
    pub fn new(channel: Channel, transport: Arc<T>, response_timeout: Duration) -> Self {
        Self {
            channel,
            transport,
            cipher: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(None)),
            listener: None,
            response_timeout,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn is_started(&self) -> bool {
        self.listener.is_some()
    }

    /// Replace the cipher. The old one, including any CBC chaining state, is
    /// dropped.
    pub fn set_key(&self, key: &Key) {
        let cipher = CipherChannel::new(self.channel.cipher_mode(), key);
        *guard(&self.cipher) = Some(cipher);
    }

    /// Subscribe to the read endpoint and start delivering responses.
    pub async fn start(&mut self) -> Result<(), LockError> {
        self.abort_listener();

        let endpoint = Endpoint::read_for(self.channel);
        tracing::debug!(channel = %self.channel, %endpoint, "enabling notifications");
        let notifications = self.transport.subscribe(endpoint).await?;

        self.listener = Some(tokio::spawn(listen(
            self.channel,
            notifications,
            Arc::clone(&self.cipher),
            Arc::clone(&self.pending),
        )));
        Ok(())
    }

    /// Stop listening and forget the key.
    pub fn stop(&mut self) {
        self.abort_listener();
        guard(&self.pending).take();
        guard(&self.cipher).take();
    }

    /// Send `command` and wait for the validated response.
    ///
    /// `command` is the cleartext frame with its payload in place. The
    /// checksum is written here, over the final plaintext, before encryption.
    pub async fn execute(&self, mut command: Frame) -> Result<Frame, LockError> {
        if !self.is_started() {
            return Err(LockError::NotStarted(self.channel));
        }

        // The response notification can arrive before the write completes, so
        // the waiter has to exist before anything goes out.
        let response = self.register_waiter()?;

        self.channel.write_checksum(&mut command);
        tracing::debug!(
            channel = %self.channel,
            opcode = self.channel.opcode(&command),
            "execute command"
        );
        if let Some(cipher) = guard(&self.cipher).as_mut() {
            cipher.encrypt(&mut command);
        }
        tracing::debug!(channel = %self.channel, data = %command.to_hex(), "write");

        let endpoint = Endpoint::write_for(self.channel);
        let exchange = async {
            self.transport.write(endpoint, command.as_bytes()).await?;
            tracing::debug!(channel = %self.channel, "write successful, waiting for notification");
            response
                .await
                .map_err(|_| TransportError::Closed(Endpoint::read_for(self.channel)))
        };

        let frame = match tokio::time::timeout(self.response_timeout, exchange).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => {
                guard(&self.pending).take();
                return Err(e.into());
            }
            Err(_) => {
                guard(&self.pending).take();
                return Err(LockError::Timeout {
                    operation: "execute",
                    after: self.response_timeout,
                });
            }
        };

        self.channel
            .validate_response(&frame)
            .map_err(|e| LockError::from_proto(self.channel, e))?;
        Ok(frame)
    }

    fn register_waiter(&self) -> Result<oneshot::Receiver<Frame>, LockError> {
        let mut slot = guard(&self.pending);
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(LockError::Busy(self.channel));
        }
        let (tx, rx) = oneshot::channel();
        *slot = Some(tx);
        Ok(rx)
    }

    fn abort_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.abort_listener();
    }
}

fn guard<V>(m: &Mutex<V>) -> std::sync::MutexGuard<'_, V> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn listen(
    channel: Channel,
    mut notifications: Notifications,
    cipher: SharedCipher,
    pending: Pending,
) {
    while let Some(data) = notifications.next().await {
        let mut frame = match Frame::from_bytes(&data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%channel, "dropping notification: {e}");
                continue;
            }
        };
        tracing::debug!(%channel, data = %frame.to_hex(), "read data");

        // every frame goes through the cipher so the CBC chain stays in step
        // with the device, even when nobody is waiting for it
        if let Some(cipher) = guard(&cipher).as_mut() {
            cipher.decrypt(&mut frame);
        }

        match guard(&pending).take() {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    tracing::debug!(%channel, "response arrived after its command gave up");
                }
            }
            None => tracing::debug!(%channel, "dropping unsolicited notification"),
        }
    }

    tracing::debug!(%channel, "notification stream ended");
    guard(&pending).take();
}
