//! Recovering the offline key from the vendor app's preferences file
//!
//! The app keeps its lock settings as an uppercase hex string inside a
//! `<string>` element, AES-128-ECB encrypted under a key baked into the app.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, KeyInit};

use crate::{BLOCK_LEN, ProtoError};

const PREFERENCES_KEY: &[u8; 16] = b"August#@3417r\0\0\0";

const STRING_END: &str = "</string>";

/// The first run of uppercase hex digits directly followed by `</string>`.
fn encoded_settings(xml: &str) -> Option<&str> {
    xml.match_indices(STRING_END).find_map(|(end, _)| {
        let head = &xml[..end];
        let start = head
            .char_indices()
            .rev()
            .take_while(|(_, c)| matches!(c, '0'..='9' | 'A'..='F'))
            .last()
            .map_or(head.len(), |(i, _)| i);
        let run = &head[start..];
        (!run.is_empty()).then_some(run)
    })
}

/// Decrypt the settings blob and strip its trailing NUL padding.
pub fn decrypt_preferences(xml: &str) -> Result<String, ProtoError> {
    let encoded = encoded_settings(xml).ok_or_else(|| {
        ProtoError::InvalidPreferences("no hex encoded settings found".to_string())
    })?;

    let mut data = data_encoding::HEXUPPER
        .decode(encoded.as_bytes())
        .map_err(|e| ProtoError::InvalidPreferences(format!("bad hex: {e}")))?;
    if data.is_empty() || data.len() % BLOCK_LEN != 0 {
        return Err(ProtoError::InvalidPreferences(format!(
            "{} bytes is not a whole number of blocks",
            data.len()
        )));
    }

    let cipher = Aes128::new(&GenericArray::from(*PREFERENCES_KEY));
    for chunk in data.chunks_mut(BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }

    let text = String::from_utf8_lossy(&data);
    Ok(text.trim_end_matches('\0').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncrypt;

    fn encrypt(plaintext: &str) -> String {
        let mut data = plaintext.as_bytes().to_vec();
        data.resize(data.len().div_ceil(BLOCK_LEN) * BLOCK_LEN, 0);
        let cipher = Aes128::new(&GenericArray::from(*PREFERENCES_KEY));
        for chunk in data.chunks_mut(BLOCK_LEN) {
            cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
        }
        data_encoding::HEXUPPER.encode(&data)
    }

    #[test]
    fn finds_the_settings_string() {
        let xml = "<map>\n<string name=\"a\">hello</string>\n<string name=\"b\">0A1B</string>\n</map>";
        assert_eq!(encoded_settings(xml), Some("0A1B"));
        assert_eq!(encoded_settings("<string>abc</string>"), None);
    }

    #[test]
    fn decrypts_and_strips_padding() {
        let settings = r#"{"offlineKey":"000102030405060708090a0b0c0d0e0f","offlineKeyOffset":1}"#;
        let xml = format!(
            "<?xml version='1.0'?>\n<map>\n    <string name=\"LockSettings\">{}</string>\n</map>\n",
            encrypt(settings)
        );
        assert_eq!(decrypt_preferences(&xml).unwrap(), settings);
    }

    #[test]
    fn rejects_partial_blocks() {
        let xml = "<string name=\"x\">00112233</string>";
        assert!(matches!(
            decrypt_preferences(xml),
            Err(ProtoError::InvalidPreferences(_))
        ));
    }

    #[test]
    fn rejects_missing_settings() {
        assert!(matches!(
            decrypt_preferences("<map/>"),
            Err(ProtoError::InvalidPreferences(_))
        ));
    }
}
