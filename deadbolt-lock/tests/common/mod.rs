//! An in-memory lock that speaks the real protocol over the `Transport` trait.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deadbolt_lock::{Endpoint, LockConfig, Notifications, Transport, TransportError};
use deadbolt_proto::{Channel, CipherChannel, CipherMode, Frame, Key, opcodes};
use futures::channel::mpsc;

pub const OFFLINE_KEY: &str = "000102030405060708090a0b0c0d0e0f";
pub const OFFLINE_KEY_INDEX: u8 = 1;
pub const NONCE: &str = "aabbccddeeff00112233445566778899";
pub const LOCK_HALF: [u8; 8] = [0x10, 0x32, 0x54, 0x76, 0x98, 0xba, 0xdc, 0xfe];

pub fn hex(s: &str) -> Vec<u8> {
    data_encoding::HEXLOWER.decode(s.as_bytes()).unwrap()
}

pub fn offline_key() -> Key {
    Key::from_hex(OFFLINE_KEY).unwrap()
}

pub fn nonce() -> deadbolt_proto::handshake::HandshakeNonce {
    deadbolt_proto::handshake::HandshakeNonce::from_bytes(hex(NONCE).try_into().unwrap())
}

pub fn lock_config() -> LockConfig {
    LockConfig {
        offline_key: offline_key(),
        offline_key_index: OFFLINE_KEY_INDEX,
        connect_timeout: Duration::from_secs(2),
        response_timeout: Duration::from_millis(300),
    }
}

/// Knobs for making the simulated lock misbehave.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub fail_connect: bool,
    pub fail_subscribe: bool,
    pub fail_writes: bool,
    /// Accept writes but never answer.
    pub silent: bool,
    /// Corrupt the security checksum of every secure response.
    pub corrupt_secure_checksum: bool,
    /// Answer the key exchange with this opcode instead of 0x02.
    pub key_exchange_opcode: Option<u8>,
    /// Answer the initialization command with this opcode instead of 0x04.
    pub init_opcode: Option<u8>,
    /// Answer the disconnect command with this opcode instead of 0x8b.
    pub disconnect_opcode: Option<u8>,
    /// Corrupt the simple checksum of every plain response.
    pub corrupt_plain_checksum: bool,
    /// Lead plain responses with this byte instead of 0xbb.
    pub plain_response_magic: Option<u8>,
    /// The answer is notified first, the write completes after this long.
    pub write_delay: Option<Duration>,
}

/// A plaintext command as the lock saw it.
#[derive(Debug, Clone)]
pub struct Received {
    pub endpoint: Endpoint,
    pub frame: Frame,
    pub checksum_ok: bool,
}

#[derive(Default)]
struct State {
    behavior: Behavior,
    connected: bool,
    connects: usize,
    disconnects: usize,
    writes: usize,
    received: Vec<Received>,
    subscribers: HashMap<Endpoint, mpsc::UnboundedSender<Vec<u8>>>,
    secure: Option<CipherChannel>,
    plain: Option<CipherChannel>,
    session_key: Option<Key>,
}

#[derive(Clone)]
pub struct FakeLock {
    offline_key: Key,
    state: Arc<Mutex<State>>,
}

impl FakeLock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            offline_key: offline_key(),
            state: Arc::new(Mutex::new(State::default())),
        })
    }

    pub fn with(behavior: Behavior) -> Arc<Self> {
        let lock = Self::new();
        lock.update(|b| *b = behavior);
        lock
    }

    pub fn update(&self, f: impl FnOnce(&mut Behavior)) {
        f(&mut self.state.lock().unwrap().behavior);
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn session_key(&self) -> Option<Key> {
        self.state.lock().unwrap().session_key.clone()
    }

    /// Notify a plain channel response nobody asked for.
    pub fn push_unsolicited_plain(&self) {
        let mut state = self.state.lock().unwrap();
        let response = plain_response(&mut state, opcodes::LOCK);
        notify(&state, Endpoint::PlainRead, response);
    }

    fn handle_secure(&self, state: &mut State, data: &[u8]) -> Option<Frame> {
        let mut frame = Frame::from_bytes(data).ok()?;
        let cipher = state
            .secure
            .get_or_insert_with(|| CipherChannel::new(CipherMode::Ecb, &self.offline_key));
        cipher.decrypt(&mut frame);
        let checksum_ok = Channel::Secure.verify_checksum(&frame).is_ok();
        state.received.push(Received {
            endpoint: Endpoint::SecureWrite,
            frame,
            checksum_ok,
        });
        if !checksum_ok {
            return None;
        }

        let opcode = Channel::Secure.opcode(&frame);
        let (reply, payload) = match opcode {
            opcodes::KEY_EXCHANGE => (
                state
                    .behavior
                    .key_exchange_opcode
                    .unwrap_or(opcodes::KEY_EXCHANGE_RESPONSE),
                LOCK_HALF,
            ),
            opcodes::INITIALIZATION => (
                state
                    .behavior
                    .init_opcode
                    .unwrap_or(opcodes::INITIALIZATION_RESPONSE),
                [0; 8],
            ),
            opcodes::DISCONNECT => (
                state
                    .behavior
                    .disconnect_opcode
                    .unwrap_or(opcodes::DISCONNECT_RESPONSE),
                [0; 8],
            ),
            _ => return None,
        };

        let mut response = Channel::Secure.build(reply, frame.byte(0x11));
        response.set_payload(&payload);
        Channel::Secure.write_checksum(&mut response);
        if state.behavior.corrupt_secure_checksum {
            let stored = response.read_u32_le(0x0c);
            response.write_u32_le(0x0c, stored.wrapping_add(1));
        }
        if let Some(cipher) = state.secure.as_mut() {
            cipher.encrypt(&mut response);
        }

        if opcode == opcodes::KEY_EXCHANGE {
            let mut key = [0u8; 16];
            key[..8].copy_from_slice(&frame.payload());
            key[8..].copy_from_slice(&LOCK_HALF);
            let key = Key::from_bytes(key);
            state.secure = Some(CipherChannel::new(CipherMode::Ecb, &key));
            state.plain = Some(CipherChannel::new(CipherMode::CbcZeroIv, &key));
            state.session_key = Some(key);
        }
        Some(response)
    }

    fn handle_plain(&self, state: &mut State, data: &[u8]) -> Option<Frame> {
        let mut frame = Frame::from_bytes(data).ok()?;
        state.plain.as_mut()?.decrypt(&mut frame);
        let checksum_ok = Channel::Plain.verify_checksum(&frame).is_ok();
        state.received.push(Received {
            endpoint: Endpoint::PlainWrite,
            frame,
            checksum_ok,
        });
        if !checksum_ok || frame.byte(0x00) != 0xee {
            return None;
        }
        Some(plain_response(state, Channel::Plain.opcode(&frame)))
    }
}

fn plain_response(state: &mut State, opcode: u8) -> Frame {
    let mut response = Frame::zeroed();
    response.set_byte(0x00, state.behavior.plain_response_magic.unwrap_or(0xbb));
    response.set_byte(0x01, opcode);
    response.set_byte(0x10, 0x02);
    Channel::Plain.write_checksum(&mut response);
    if state.behavior.corrupt_plain_checksum {
        response.set_byte(0x03, response.byte(0x03).wrapping_add(1));
    }
    if let Some(cipher) = state.plain.as_mut() {
        cipher.encrypt(&mut response);
    }
    response
}

fn notify(state: &State, endpoint: Endpoint, frame: Frame) {
    if let Some(tx) = state.subscribers.get(&endpoint) {
        let _ = tx.unbounded_send(frame.to_vec());
    }
}

#[async_trait]
impl Transport for FakeLock {
    async fn connect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if state.behavior.fail_connect {
            return Err(TransportError::Connect("lock out of range".to_string()));
        }
        state.connected = true;
        state.secure = None;
        state.plain = None;
        state.session_key = None;
        Ok(())
    }

    async fn subscribe(&self, endpoint: Endpoint) -> Result<Notifications, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.behavior.fail_subscribe {
            return Err(TransportError::Subscribe {
                endpoint,
                reason: "notifications refused".to_string(),
            });
        }
        let (tx, rx) = mpsc::unbounded();
        state.subscribers.insert(endpoint, tx);
        Ok(Box::pin(rx))
    }

    async fn write(&self, endpoint: Endpoint, data: &[u8]) -> Result<(), TransportError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.writes += 1;
            if state.behavior.fail_writes || !state.connected {
                return Err(TransportError::Write {
                    endpoint,
                    reason: "not connected".to_string(),
                });
            }
            if state.behavior.silent {
                return Ok(());
            }

            let response = match endpoint {
                Endpoint::SecureWrite => self.handle_secure(&mut state, data),
                Endpoint::PlainWrite => self.handle_plain(&mut state, data),
                _ => None,
            };
            if let Some(response) = response {
                let read = match endpoint {
                    Endpoint::SecureWrite => Endpoint::SecureRead,
                    _ => Endpoint::PlainRead,
                };
                notify(&state, read, response);
            }
            state.behavior.write_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn disconnect(&self) {
        let mut state = self.state.lock().unwrap();
        state.disconnects += 1;
        state.connected = false;
        state.subscribers.clear();
    }
}
