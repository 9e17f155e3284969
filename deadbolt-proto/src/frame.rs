//! The fixed size command/response buffer

use crate::ProtoError;

/// Length of every command and response
pub const FRAME_LEN: usize = 0x12;

/// Length of the enciphered prefix of a frame
pub const BLOCK_LEN: usize = 0x10;

/// Length of the payload at [`Frame::PAYLOAD_OFFSET`]
pub const PAYLOAD_LEN: usize = 8;

/// An 18 byte command or response, zero initialized
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    pub const PAYLOAD_OFFSET: usize = 0x04;

    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn from_array(bytes: [u8; FRAME_LEN]) -> Self {
        Self { bytes }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtoError> {
        let bytes: [u8; FRAME_LEN] =
            data.try_into().map_err(|_| ProtoError::InvalidLength {
                expected: FRAME_LEN,
                actual: data.len(),
            })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; FRAME_LEN] {
        &mut self.bytes
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// The enciphered region, bytes 0x00..0x10
    pub fn block_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..BLOCK_LEN]
    }

    pub fn byte(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    pub fn set_byte(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
    }

    pub fn read_u32_le(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ])
    }

    pub fn write_u32_le(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn payload(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        out.copy_from_slice(&self.bytes[Self::PAYLOAD_OFFSET..Self::PAYLOAD_OFFSET + PAYLOAD_LEN]);
        out
    }

    pub fn set_payload(&mut self, payload: &[u8; PAYLOAD_LEN]) {
        self.bytes[Self::PAYLOAD_OFFSET..Self::PAYLOAD_OFFSET + PAYLOAD_LEN].copy_from_slice(payload);
    }

    pub fn to_hex(&self) -> String {
        data_encoding::HEXLOWER.encode(&self.bytes)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            Frame::from_bytes(&[0u8; 16]),
            Err(ProtoError::InvalidLength { expected: 18, actual: 16 })
        );
        assert!(Frame::from_bytes(&[0u8; 18]).is_ok());
    }

    #[test]
    fn payload_lives_at_offset_four() {
        let mut frame = Frame::zeroed();
        frame.set_payload(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&frame.as_bytes()[..12], &[0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(frame.payload(), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn u32_fields_are_little_endian() {
        let mut frame = Frame::zeroed();
        frame.write_u32_le(0x0c, 0x1234_5678);
        assert_eq!(&frame.as_bytes()[0x0c..0x10], &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(frame.read_u32_le(0x0c), 0x1234_5678);
    }
}
