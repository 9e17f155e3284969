//! Per-channel layout, checksum and cipher selection

use crate::checksum::{verify_security, verify_simple, write_security, write_simple};
use crate::{
    CipherMode, Frame, PLAIN_REQUEST_MAGIC, PLAIN_RESPONSE_MAGIC, PLAIN_TRAILER, ProtoError,
    SECURE_TRAILER,
};

/// The two command channels a lock exposes.
///
/// `Secure` carries the handshake and disconnect, `Plain` carries lock and
/// unlock once the session key is in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Secure,
    Plain,
}

impl Channel {
    pub fn name(self) -> &'static str {
        match self {
            Channel::Secure => "secure",
            Channel::Plain => "plain",
        }
    }

    pub fn cipher_mode(self) -> CipherMode {
        match self {
            Channel::Secure => CipherMode::Ecb,
            Channel::Plain => CipherMode::CbcZeroIv,
        }
    }

    /// A zeroed frame carrying `opcode`. The checksum is left empty,
    /// [`Channel::write_checksum`] fills it once the payload is final.
    /// `key_index` only has a slot on the secure channel.
    pub fn build(self, opcode: u8, key_index: u8) -> Frame {
        let mut frame = Frame::zeroed();
        match self {
            Channel::Secure => {
                frame.set_byte(0x00, opcode);
                frame.set_byte(0x10, SECURE_TRAILER);
                frame.set_byte(0x11, key_index);
            }
            Channel::Plain => {
                frame.set_byte(0x00, PLAIN_REQUEST_MAGIC);
                frame.set_byte(0x01, opcode);
                frame.set_byte(0x10, PLAIN_TRAILER);
            }
        }
        frame
    }

    pub fn opcode(self, frame: &Frame) -> u8 {
        match self {
            Channel::Secure => frame.byte(0x00),
            Channel::Plain => frame.byte(0x01),
        }
    }

    pub fn write_checksum(self, frame: &mut Frame) {
        match self {
            Channel::Secure => write_security(frame),
            Channel::Plain => write_simple(frame),
        }
    }

    pub fn verify_checksum(self, frame: &Frame) -> Result<(), ProtoError> {
        match self {
            Channel::Secure => verify_security(frame),
            Channel::Plain => verify_simple(frame),
        }
    }

    /// Checksum, then on the plain channel the response magic.
    pub fn validate_response(self, frame: &Frame) -> Result<(), ProtoError> {
        self.verify_checksum(frame)?;
        if self == Channel::Plain && !PLAIN_RESPONSE_MAGIC.contains(&frame.byte(0x00)) {
            return Err(ProtoError::UnexpectedMagic(frame.byte(0x00)));
        }
        Ok(())
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
