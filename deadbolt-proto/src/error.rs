use crate::ChecksumKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    #[error("{kind} checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        kind: ChecksumKind,
        expected: u32,
        actual: u32,
    },
    #[error("unexpected magic in response: 0x{0:02x}")]
    UnexpectedMagic(u8),
    #[error("frame must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid preferences: {0}")]
    InvalidPreferences(String),
}
