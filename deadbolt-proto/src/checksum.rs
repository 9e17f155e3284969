//! The two additive checksums
//!
//! The plain channel uses an 8 bit sum over the whole frame, the secure
//! channel a 32 bit sum over the first three little endian words.

use crate::{Frame, ProtoError};

/// Offset of the simple checksum byte on the plain channel
pub const SIMPLE_CHECKSUM_OFFSET: usize = 0x03;

/// Offset of the security checksum word on the secure channel
pub const SECURITY_CHECKSUM_OFFSET: usize = 0x0c;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Simple,
    Security,
}

impl std::fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumKind::Simple => f.write_str("simple"),
            ChecksumKind::Security => f.write_str("security"),
        }
    }
}

fn byte_sum(frame: &Frame) -> u8 {
    frame
        .as_bytes()
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// The byte that makes the frame sum to zero mod 256, ignoring whatever is
/// currently stored at the checksum offset.
pub fn simple_checksum(frame: &Frame) -> u8 {
    let rest = byte_sum(frame).wrapping_sub(frame.byte(SIMPLE_CHECKSUM_OFFSET));
    0u8.wrapping_sub(rest)
}

/// `0 - (w0 + w1 + w2) mod 2^32` over the words at 0x00, 0x04 and 0x08.
pub fn security_checksum(frame: &Frame) -> u32 {
    let sum = frame
        .read_u32_le(0x00)
        .wrapping_add(frame.read_u32_le(0x04))
        .wrapping_add(frame.read_u32_le(0x08));
    0u32.wrapping_sub(sum)
}

pub(crate) fn write_simple(frame: &mut Frame) {
    let checksum = simple_checksum(frame);
    frame.set_byte(SIMPLE_CHECKSUM_OFFSET, checksum);
}

pub(crate) fn write_security(frame: &mut Frame) {
    let checksum = security_checksum(frame);
    frame.write_u32_le(SECURITY_CHECKSUM_OFFSET, checksum);
}

pub(crate) fn verify_simple(frame: &Frame) -> Result<(), ProtoError> {
    match byte_sum(frame) {
        0 => Ok(()),
        sum => Err(ProtoError::ChecksumMismatch {
            kind: ChecksumKind::Simple,
            expected: 0,
            actual: u32::from(sum),
        }),
    }
}

pub(crate) fn verify_security(frame: &Frame) -> Result<(), ProtoError> {
    let expected = security_checksum(frame);
    let actual = frame.read_u32_le(SECURITY_CHECKSUM_OFFSET);
    if expected != actual {
        return Err(ProtoError::ChecksumMismatch {
            kind: ChecksumKind::Security,
            expected,
            actual,
        });
    }
    Ok(())
}
