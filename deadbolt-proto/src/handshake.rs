//! Session key exchange
//!
//! The mobile side picks a 16 byte nonce. Bytes 0..8 go out with
//! [`opcodes::KEY_EXCHANGE`], the lock answers with 8 bytes of its own, and
//! the session key is the concatenation of the two halves. Bytes 8..16 of the
//! nonce then go out with [`opcodes::INITIALIZATION`] under the new key.

use crate::{Channel, Frame, KEY_LEN, Key, PAYLOAD_LEN, opcodes};

pub const NONCE_LEN: usize = 16;

/// Per-connect random bytes, discarded once the session key exists.
#[derive(Clone, PartialEq, Eq)]
pub struct HandshakeNonce([u8; NONCE_LEN]);

impl HandshakeNonce {
    pub fn generate() -> Self {
        Self(rand::random())
    }

    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn first_half(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        out.copy_from_slice(&self.0[..PAYLOAD_LEN]);
        out
    }

    pub fn second_half(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        out.copy_from_slice(&self.0[PAYLOAD_LEN..]);
        out
    }
}

impl std::fmt::Debug for HandshakeNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HandshakeNonce(<redacted>)")
    }
}

/// SEC_LOCK_TO_MOBILE_KEY_EXCHANGE, checksum not yet written
pub fn key_exchange_command(nonce: &HandshakeNonce, key_index: u8) -> Frame {
    let mut frame = Channel::Secure.build(opcodes::KEY_EXCHANGE, key_index);
    frame.set_payload(&nonce.first_half());
    frame
}

/// SEC_INITIALIZATION_COMMAND, checksum not yet written
pub fn initialization_command(nonce: &HandshakeNonce, key_index: u8) -> Frame {
    let mut frame = Channel::Secure.build(opcodes::INITIALIZATION, key_index);
    frame.set_payload(&nonce.second_half());
    frame
}

/// The disconnect command always goes out with key index zero.
pub fn disconnect_command() -> Frame {
    Channel::Secure.build(opcodes::DISCONNECT, 0)
}

/// nonce[0..8] followed by the payload of the lock's key exchange response.
pub fn derive_session_key(nonce: &HandshakeNonce, response: &Frame) -> Key {
    let mut key = [0u8; KEY_LEN];
    key[..PAYLOAD_LEN].copy_from_slice(&nonce.first_half());
    key[PAYLOAD_LEN..].copy_from_slice(&response.payload());
    Key::from_bytes(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonce() -> HandshakeNonce {
        HandshakeNonce::from_bytes([
            0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77,
            0x88, 0x99,
        ])
    }

    fn response() -> Frame {
        let mut frame = Frame::zeroed();
        frame.set_byte(0x00, opcodes::KEY_EXCHANGE_RESPONSE);
        frame.set_payload(&[0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80]);
        frame
    }

    #[test]
    fn session_key_is_nonce_head_then_lock_payload() {
        let key = derive_session_key(&nonce(), &response());
        assert_eq!(
            key.as_bytes(),
            &[
                0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00, 0x11, 0x10, 0x20, 0x30, 0x40, 0x50,
                0x60, 0x70, 0x80
            ]
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(
            derive_session_key(&nonce(), &response()),
            derive_session_key(&nonce(), &response())
        );
    }

    #[test]
    fn commands_carry_the_right_nonce_half() {
        let exchange = key_exchange_command(&nonce(), 3);
        assert_eq!(exchange.byte(0x00), opcodes::KEY_EXCHANGE);
        assert_eq!(exchange.payload(), nonce().first_half());
        assert_eq!(exchange.byte(0x11), 3);

        let init = initialization_command(&nonce(), 3);
        assert_eq!(init.byte(0x00), opcodes::INITIALIZATION);
        assert_eq!(init.payload(), nonce().second_half());
        assert_eq!(init.byte(0x11), 3);
    }

    #[test]
    fn disconnect_forces_key_index_zero() {
        let frame = disconnect_command();
        assert_eq!(frame.byte(0x00), opcodes::DISCONNECT);
        assert_eq!(frame.byte(0x10), 0x0f);
        assert_eq!(frame.byte(0x11), 0x00);
    }

    #[test]
    fn generated_nonces_differ() {
        assert_ne!(HandshakeNonce::generate(), HandshakeNonce::generate());
    }
}
