use std::time::Duration;

use deadbolt_proto::{Channel, ChecksumKind, ProtoError};

use crate::{Endpoint, LockState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("subscribe to {endpoint} failed: {reason}")]
    Subscribe { endpoint: Endpoint, reason: String },
    #[error("write to {endpoint} failed: {reason}")]
    Write { endpoint: Endpoint, reason: String },
    #[error("notifications on {0} stopped")]
    Closed(Endpoint),
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("{channel} channel: {kind} checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        channel: Channel,
        kind: ChecksumKind,
        expected: u32,
        actual: u32,
    },
    #[error("unexpected response on {channel} channel: {reason}")]
    UnexpectedResponse { channel: Channel, reason: String },
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: LockState,
    },
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("a command is already in flight on the {0} channel")]
    Busy(Channel),
    #[error("{0} session has not been started")]
    NotStarted(Channel),
}

impl LockError {
    pub fn from_proto(channel: Channel, e: ProtoError) -> Self {
        match e {
            ProtoError::ChecksumMismatch {
                kind,
                expected,
                actual,
            } => LockError::ChecksumMismatch {
                channel,
                kind,
                expected,
                actual,
            },
            other => LockError::UnexpectedResponse {
                channel,
                reason: other.to_string(),
            },
        }
    }

    /// True when the link itself failed and the connection must be
    /// considered dead. Protocol level failures leave it usable.
    pub fn is_transport_level(&self) -> bool {
        matches!(self, LockError::Transport(_) | LockError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_errors_keep_their_kind() {
        let e = LockError::from_proto(
            Channel::Secure,
            ProtoError::ChecksumMismatch {
                kind: ChecksumKind::Security,
                expected: 1,
                actual: 2,
            },
        );
        assert!(matches!(
            e,
            LockError::ChecksumMismatch {
                channel: Channel::Secure,
                kind: ChecksumKind::Security,
                expected: 1,
                actual: 2,
            }
        ));

        let e = LockError::from_proto(Channel::Plain, ProtoError::UnexpectedMagic(0xee));
        assert!(matches!(e, LockError::UnexpectedResponse { channel: Channel::Plain, .. }));
        assert_eq!(
            e.to_string(),
            "unexpected response on plain channel: unexpected magic in response: 0xee"
        );
    }

    #[test]
    fn only_link_failures_are_transport_level() {
        assert!(LockError::Transport(TransportError::Closed(Endpoint::PlainRead)).is_transport_level());
        assert!(
            LockError::Timeout {
                operation: "unlock",
                after: Duration::from_secs(1)
            }
            .is_transport_level()
        );
        assert!(!LockError::Busy(Channel::Plain).is_transport_level());
        assert!(
            !LockError::InvalidState {
                operation: "lock",
                state: LockState::Disconnected
            }
            .is_transport_level()
        );
    }
}
