//! Decoding of HCI captures taken while the vendor app talks to a lock
//!
//! Input is the text produced by
//!
//! ```text
//! tshark -r btsnoop_hci.log -Y 'btatt.opcode == 0x12 || btatt.opcode == 0x1d' \
//!     -Tfields -e frame.number -e btatt.opcode -e btatt.handle -e btatt.value
//! ```
//!
//! Four decipher streams are kept, one per channel and direction. They start
//! with the offline key and are all re-keyed once both halves of the session
//! key have been observed.

use crate::ble::SECURE_CAPTURE_HANDLES;
use crate::{Channel, CipherChannel, Frame, KEY_LEN, Key, PAYLOAD_LEN, opcodes};

/// ATT opcode of a write request
pub const ATT_WRITE_REQUEST: u8 = 0x12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

/// One line of tshark output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    pub frame_number: u64,
    pub att_opcode: u8,
    pub handle: u16,
    pub value: Frame,
}

impl CaptureRecord {
    /// `None` for lines that are not four tab separated fields or whose
    /// value is not an 18 byte frame.
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
        let [frame_number, att_opcode, handle, value] = fields.as_slice() else {
            return None;
        };

        let hex: String = value
            .chars()
            .filter(|c| *c != ':')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let bytes = data_encoding::HEXLOWER.decode(hex.as_bytes()).ok()?;

        Some(Self {
            frame_number: frame_number.trim().parse().ok()?,
            att_opcode: att_opcode.trim().parse().ok()?,
            handle: handle.trim().parse().ok()?,
            value: Frame::from_bytes(&bytes).ok()?,
        })
    }

    pub fn direction(&self) -> Direction {
        if self.att_opcode == ATT_WRITE_REQUEST {
            Direction::Write
        } else {
            Direction::Read
        }
    }

    pub fn channel(&self) -> Channel {
        if SECURE_CAPTURE_HANDLES.contains(&self.handle) {
            Channel::Secure
        } else {
            Channel::Plain
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub frame_number: u64,
    pub direction: Direction,
    pub channel: Channel,
    /// Always true on the plain channel, whose checksum is not checked here
    pub checksum_ok: bool,
    pub plaintext: Frame,
}

impl std::fmt::Display for DecodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = if self.channel == Channel::Secure { "S" } else { "" };
        let op = match self.direction {
            Direction::Write => "WRITE",
            Direction::Read => "READ",
        };
        let marker = if self.checksum_ok { "" } else { "*" };
        write!(
            f,
            "{}\t{prefix}{op}{marker}\t{}",
            self.frame_number,
            self.plaintext.to_hex()
        )
    }
}

struct Streams {
    write: CipherChannel,
    read: CipherChannel,
}

impl Streams {
    fn new(channel: Channel, key: &Key) -> Self {
        Self {
            write: CipherChannel::new(channel.cipher_mode(), key),
            read: CipherChannel::new(channel.cipher_mode(), key),
        }
    }

    fn get(&mut self, direction: Direction) -> &mut CipherChannel {
        match direction {
            Direction::Write => &mut self.write,
            Direction::Read => &mut self.read,
        }
    }
}

pub struct CaptureDecoder {
    secure: Streams,
    plain: Option<Streams>,
    session_key: [u8; KEY_LEN],
}

impl CaptureDecoder {
    pub fn new(offline_key: &Key) -> Self {
        Self {
            secure: Streams::new(Channel::Secure, offline_key),
            plain: None,
            session_key: [0u8; KEY_LEN],
        }
    }

    /// Decode one record. Plain channel traffic seen before the session key
    /// has been established cannot be deciphered and yields `None`.
    pub fn decode(&mut self, record: &CaptureRecord) -> Option<DecodedFrame> {
        let direction = record.direction();
        let channel = record.channel();
        let mut frame = record.value;

        match channel {
            Channel::Secure => self.secure.get(direction).decrypt(&mut frame),
            Channel::Plain => self.plain.as_mut()?.get(direction).decrypt(&mut frame),
        }

        let checksum_ok = match channel {
            Channel::Secure => Channel::Secure.verify_checksum(&frame).is_ok(),
            Channel::Plain => true,
        };

        if channel == Channel::Secure {
            self.observe_secure(&frame);
        }

        Some(DecodedFrame {
            frame_number: record.frame_number,
            direction,
            channel,
            checksum_ok,
            plaintext: frame,
        })
    }

    fn observe_secure(&mut self, frame: &Frame) {
        match frame.byte(0x00) {
            opcodes::KEY_EXCHANGE => {
                self.session_key = [0u8; KEY_LEN];
                self.session_key[..PAYLOAD_LEN].copy_from_slice(&frame.payload());
            }
            opcodes::KEY_EXCHANGE_RESPONSE => {
                self.session_key[PAYLOAD_LEN..].copy_from_slice(&frame.payload());
                let key = Key::from_bytes(self.session_key);
                self.secure = Streams::new(Channel::Secure, &key);
                self.plain = Some(Streams::new(Channel::Plain, &key));
            }
            _ => {}
        }
    }
}

/// Decode a whole tshark export, skipping lines that do not hold a frame.
pub fn decode_capture(offline_key: &Key, text: &str) -> Vec<DecodedFrame> {
    let mut decoder = CaptureDecoder::new(offline_key);
    text.lines()
        .filter_map(CaptureRecord::parse)
        .filter_map(|record| decoder.decode(&record))
        .collect()
}
