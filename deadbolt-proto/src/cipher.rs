//! AES-128 over the first 16 bytes of a frame
//!
//! The last two bytes of every frame are never enciphered. Padding is never
//! applied, each frame is exactly one block.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::{BLOCK_LEN, Frame, Key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    /// AES-128-ECB, no IV (secure channel)
    Ecb,
    /// AES-128-CBC starting from an all zero IV (plain channel)
    CbcZeroIv,
}

/// Encrypt and decrypt state for one channel under one key.
///
/// In CBC mode each direction carries its own chaining block. Both start at
/// zero and advance with every frame, so a sender and receiver created from
/// the same key stay in step as long as they see the same frames in order.
/// Re-keying means building a new `CipherChannel`.
#[derive(Clone)]
pub struct CipherChannel {
    mode: CipherMode,
    aes: Aes128,
    encrypt_chain: [u8; BLOCK_LEN],
    decrypt_chain: [u8; BLOCK_LEN],
}

impl CipherChannel {
    pub fn new(mode: CipherMode, key: &Key) -> Self {
        Self {
            mode,
            aes: Aes128::new(&GenericArray::from(*key.as_bytes())),
            encrypt_chain: [0u8; BLOCK_LEN],
            decrypt_chain: [0u8; BLOCK_LEN],
        }
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn encrypt(&mut self, frame: &mut Frame) {
        let block = frame.block_mut();
        if self.mode == CipherMode::CbcZeroIv {
            xor_in_place(block, &self.encrypt_chain);
        }
        self.aes.encrypt_block(aes::Block::from_mut_slice(block));
        if self.mode == CipherMode::CbcZeroIv {
            self.encrypt_chain.copy_from_slice(block);
        }
    }

    pub fn decrypt(&mut self, frame: &mut Frame) {
        let block = frame.block_mut();
        let mut ciphertext = [0u8; BLOCK_LEN];
        ciphertext.copy_from_slice(block);
        self.aes.decrypt_block(aes::Block::from_mut_slice(block));
        if self.mode == CipherMode::CbcZeroIv {
            xor_in_place(block, &self.decrypt_chain);
            self.decrypt_chain = ciphertext;
        }
    }
}

impl std::fmt::Debug for CipherChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherChannel")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn xor_in_place(block: &mut [u8], other: &[u8; BLOCK_LEN]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}
