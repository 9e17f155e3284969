use crate::ProtoError;

pub const KEY_LEN: usize = 16;

/// A 16 byte AES-128 key. `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Decode a 32 character hex string, either case.
    pub fn from_hex(s: &str) -> Result<Self, ProtoError> {
        let s = s.trim().to_ascii_lowercase();
        let bytes = data_encoding::HEXLOWER
            .decode(s.as_bytes())
            .map_err(|e| ProtoError::InvalidKey(format!("not hex: {e}")))?;
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            ProtoError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl std::str::FromStr for Key {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Key(<redacted>)")
    }
}
