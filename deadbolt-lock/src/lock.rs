use std::sync::Arc;
use std::time::Duration;

use deadbolt_proto::handshake::{self, HandshakeNonce};
use deadbolt_proto::{Channel, Frame, Key, opcodes};

use crate::{LockError, Session, Transport};

/// Where a [`Lock`] is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Disconnected,
    Connecting,
    AwaitingKeyExchange,
    AwaitingInitAck,
    Ready,
    Disconnecting,
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LockState::Disconnected => "disconnected",
            LockState::Connecting => "connecting",
            LockState::AwaitingKeyExchange => "awaiting key exchange",
            LockState::AwaitingInitAck => "awaiting initialization ack",
            LockState::Ready => "ready",
            LockState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// An operational command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Lock,
    Unlock,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Lock => "lock",
            Operation::Unlock => "unlock",
        }
    }

    fn opcode(self) -> u8 {
        match self {
            Operation::Lock => opcodes::LOCK,
            Operation::Unlock => opcodes::UNLOCK,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct LockConfig {
    pub offline_key: Key,
    /// Slot of `offline_key` in the lock's key table.
    pub offline_key_index: u8,
    /// Bounds opening the transport, and separately the whole handshake.
    pub connect_timeout: Duration,
    /// Bounds each command's round trip.
    pub response_timeout: Duration,
}

impl LockConfig {
    pub fn new(offline_key: Key, offline_key_index: u8) -> Self {
        Self {
            offline_key,
            offline_key_index,
            connect_timeout: Duration::from_secs(30),
            response_timeout: Duration::from_secs(10),
        }
    }
}

/// One lock, reached over `T`.
///
/// `connect` runs the two step handshake on the secure channel, which leaves
/// both channels keyed with a fresh session key. `lock` and `unlock` then go
/// over the plain channel until `disconnect`.
pub struct Lock<T: Transport> {
    transport: Arc<T>,
    config: LockConfig,
    secure: Session<T>,
    plain: Session<T>,
    state: LockState,
}

impl<T: Transport> Lock<T> {
    pub fn new(transport: Arc<T>, config: LockConfig) -> Self {
        let secure = Session::new(
            Channel::Secure,
            Arc::clone(&transport),
            config.response_timeout,
        );
        let plain = Session::new(
            Channel::Plain,
            Arc::clone(&transport),
            config.response_timeout,
        );
        Self {
            transport,
            config,
            secure,
            plain,
            state: LockState::Disconnected,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Connect and handshake with a fresh random nonce.
    pub async fn connect(&mut self) -> Result<(), LockError> {
        self.connect_with_nonce(HandshakeNonce::generate()).await
    }

    /// Connect and handshake with a caller supplied nonce.
    ///
    /// Exists so tests can pin the session key. Production code goes through
    /// [`Lock::connect`], which draws a fresh random nonce. Any failure tears the transport down again and leaves the lock
    /// `Disconnected`.
    pub async fn connect_with_nonce(&mut self, nonce: HandshakeNonce) -> Result<(), LockError> {
        if self.state != LockState::Disconnected {
            return Err(LockError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }

        self.set_state(LockState::Connecting);
        let timeout = self.config.connect_timeout;
        let connected = tokio::time::timeout(timeout, self.transport.connect()).await;
        match connected {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.teardown().await;
                return Err(e.into());
            }
            Err(_) => {
                self.teardown().await;
                return Err(LockError::Timeout {
                    operation: "connect",
                    after: timeout,
                });
            }
        }

        let result = tokio::time::timeout(timeout, self.handshake(&nonce))
            .await
            .unwrap_or(Err(LockError::Timeout {
                operation: "handshake",
                after: timeout,
            }));
        if let Err(e) = result {
            tracing::warn!(state = %self.state, "handshake failed: {e}");
            self.teardown().await;
            return Err(e);
        }

        self.set_state(LockState::Ready);
        Ok(())
    }

    async fn handshake(&mut self, nonce: &HandshakeNonce) -> Result<(), LockError> {
        self.secure.set_key(&self.config.offline_key);

        let (secure, plain) = tokio::join!(self.secure.start(), self.plain.start());
        secure?;
        plain?;

        self.set_state(LockState::AwaitingKeyExchange);
        let index = self.config.offline_key_index;
        let response = self
            .secure
            .execute(handshake::key_exchange_command(nonce, index))
            .await?;
        expect_opcode(Channel::Secure, &response, opcodes::KEY_EXCHANGE_RESPONSE)?;

        let session_key = handshake::derive_session_key(nonce, &response);
        self.plain.set_key(&session_key);
        self.secure.set_key(&session_key);
        tracing::debug!("session key installed");

        self.set_state(LockState::AwaitingInitAck);
        let response = self
            .secure
            .execute(handshake::initialization_command(nonce, index))
            .await?;
        expect_opcode(Channel::Secure, &response, opcodes::INITIALIZATION_RESPONSE)
    }

    pub async fn lock(&mut self) -> Result<Frame, LockError> {
        self.operate(Operation::Lock).await
    }

    pub async fn unlock(&mut self) -> Result<Frame, LockError> {
        self.operate(Operation::Unlock).await
    }

    /// Connect, run `operation`, then disconnect whatever happened.
    ///
    /// The first error wins: a failed operation is reported over a failed
    /// disconnect.
    ///
    /// A connection left behind by an earlier, abandoned `run` is closed
    /// first.
    pub async fn run(&mut self, operation: Operation) -> Result<Frame, LockError> {
        if self.state != LockState::Disconnected {
            tracing::warn!(state = %self.state, "closing stale connection");
            if let Err(e) = self.disconnect().await {
                tracing::debug!("stale disconnect: {e}");
            }
        }
        self.connect().await?;
        let result = self.operate(operation).await;
        let disconnected = match self.state {
            LockState::Disconnected => Ok(()),
            _ => self.disconnect().await,
        };
        let response = result?;
        disconnected?;
        Ok(response)
    }

    pub async fn operate(&mut self, operation: Operation) -> Result<Frame, LockError> {
        if self.state != LockState::Ready {
            return Err(LockError::InvalidState {
                operation: operation.name(),
                state: self.state,
            });
        }

        tracing::info!("{operation}");
        let command = Channel::Plain.build(operation.opcode(), self.config.offline_key_index);
        match self.plain.execute(command).await {
            Ok(response) => Ok(response),
            Err(e) => {
                if e.is_transport_level() {
                    tracing::warn!("{operation} failed, dropping connection: {e}");
                    self.teardown().await;
                }
                Err(e)
            }
        }
    }

    /// End the session and close the transport.
    ///
    /// From `Ready` the disconnect command is sent first. The transport is
    /// closed whatever it returns, and its error, if any, is still reported.
    /// From any other connected state this only cleans up.
    pub async fn disconnect(&mut self) -> Result<(), LockError> {
        match self.state {
            LockState::Disconnected => Err(LockError::InvalidState {
                operation: "disconnect",
                state: self.state,
            }),
            LockState::Ready => {
                self.set_state(LockState::Disconnecting);
                let result = self
                    .secure
                    .execute(handshake::disconnect_command())
                    .await
                    .and_then(|response| {
                        expect_opcode(Channel::Secure, &response, opcodes::DISCONNECT_RESPONSE)
                    });
                self.teardown().await;
                result
            }
            _ => {
                self.teardown().await;
                Ok(())
            }
        }
    }

    async fn teardown(&mut self) {
        self.secure.stop();
        self.plain.stop();
        let timeout = self.config.connect_timeout;
        if tokio::time::timeout(timeout, self.transport.disconnect())
            .await
            .is_err()
        {
            tracing::warn!("transport disconnect timed out after {timeout:?}");
        }
        self.set_state(LockState::Disconnected);
    }

    fn set_state(&mut self, state: LockState) {
        if self.state != state {
            tracing::info!(from = %self.state, to = %state, "lock state");
            self.state = state;
        }
    }
}

fn expect_opcode(channel: Channel, response: &Frame, expected: u8) -> Result<(), LockError> {
    let actual = channel.opcode(response);
    if actual != expected {
        return Err(LockError::UnexpectedResponse {
            channel,
            reason: format!("expected opcode {expected:#04x}, got {actual:#04x}"),
        });
    }
    Ok(())
}
