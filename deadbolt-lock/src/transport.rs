//! The notify/write link a lock is reached over
//!
//! Production uses BLE GATT (`deadbolt-ble`), tests use an in-memory lock.

use std::pin::Pin;

use async_trait::async_trait;
use deadbolt_proto::Channel;
use futures::Stream;

use crate::TransportError;

/// Inbound frames from one read endpoint, in arrival order.
pub type Notifications = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// The four characteristics a lock exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    PlainWrite,
    PlainRead,
    SecureWrite,
    SecureRead,
}

impl Endpoint {
    pub fn write_for(channel: Channel) -> Self {
        match channel {
            Channel::Secure => Endpoint::SecureWrite,
            Channel::Plain => Endpoint::PlainWrite,
        }
    }

    pub fn read_for(channel: Channel) -> Self {
        match channel {
            Channel::Secure => Endpoint::SecureRead,
            Channel::Plain => Endpoint::PlainRead,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Endpoint::PlainWrite => "plain-write",
            Endpoint::PlainRead => "plain-read",
            Endpoint::SecureWrite => "secure-write",
            Endpoint::SecureRead => "secure-read",
        };
        f.write_str(name)
    }
}

/// Connection-oriented link with separate write and notify endpoints.
///
/// A write only reports local completion. The device's answer comes back as a
/// notification on the matching read endpoint, and may be delivered before the
/// write itself completes.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the connection and resolve the endpoints.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Enable notifications on a read endpoint.
    ///
    /// Every frame delivered after this returns shows up on the stream. The
    /// stream ends when the connection goes away.
    async fn subscribe(&self, endpoint: Endpoint) -> Result<Notifications, TransportError>;

    /// Write one frame, without waiting for the device to answer.
    async fn write(&self, endpoint: Endpoint, data: &[u8]) -> Result<(), TransportError>;

    /// Close the connection. Best effort and idempotent.
    async fn disconnect(&self);
}
