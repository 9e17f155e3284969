//! Deadbolt wire protocol - command framing, checksums and ciphers
//!
//! Every command and response on either channel is an 18 byte [`Frame`]. The
//! first 16 bytes are enciphered, the trailing two travel in the clear.
//!
//! ```text
//! offset  plain channel                 secure channel
//! 0x00    magic (0xee / 0xbb / 0xaa)    opcode
//! 0x01    opcode                        -
//! 0x03    simple checksum               -
//! 0x04    payload (8 bytes)             payload (8 bytes)
//! 0x0c    reserved                      security checksum (u32 le)
//! 0x10    0x02                          0x0f
//! 0x11    reserved                      offline key index
//! ```
//!
//! This crate does no I/O. The session and handshake logic that drives these
//! types over a transport lives in `deadbolt-lock`.

pub mod ble;
pub mod capture;
mod channel;
mod checksum;
mod cipher;
mod error;
mod frame;
pub mod handshake;
mod key;
pub mod prefs;

pub use channel::Channel;
pub use checksum::{ChecksumKind, security_checksum, simple_checksum};
pub use cipher::{CipherChannel, CipherMode};
pub use error::ProtoError;
pub use frame::{BLOCK_LEN, FRAME_LEN, Frame, PAYLOAD_LEN};
pub use key::{KEY_LEN, Key};

/// Magic byte leading every plain channel request
pub const PLAIN_REQUEST_MAGIC: u8 = 0xee;

/// Magic bytes accepted at the head of a plain channel response
pub const PLAIN_RESPONSE_MAGIC: [u8; 2] = [0xbb, 0xaa];

/// Trailer constant at 0x10 on the plain channel
pub const PLAIN_TRAILER: u8 = 0x02;

/// Trailer constant at 0x10 on the secure channel
pub const SECURE_TRAILER: u8 = 0x0f;

/// Command opcodes
pub mod opcodes {
    /// SEC_LOCK_TO_MOBILE_KEY_EXCHANGE - carries nonce bytes 0..8
    pub const KEY_EXCHANGE: u8 = 0x01;

    /// Lock's answer to [`KEY_EXCHANGE`], carries the lock's half of the session key
    pub const KEY_EXCHANGE_RESPONSE: u8 = 0x02;

    /// SEC_INITIALIZATION_COMMAND - carries nonce bytes 8..16
    pub const INITIALIZATION: u8 = 0x03;

    /// Lock's answer to [`INITIALIZATION`]
    pub const INITIALIZATION_RESPONSE: u8 = 0x04;

    /// Terminate the secure session
    pub const DISCONNECT: u8 = 0x05;

    /// Lock's answer to [`DISCONNECT`]
    pub const DISCONNECT_RESPONSE: u8 = 0x8b;

    /// Unlock (plain channel)
    pub const UNLOCK: u8 = 0x0a;

    /// Lock (plain channel)
    pub const LOCK: u8 = 0x0b;
}
