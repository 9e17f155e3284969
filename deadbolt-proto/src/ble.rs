//! BLE GATT service constants for the lock command service
//!
//! Each channel owns one write and one notify characteristic.

/// Lock command service UUID
pub const SERVICE_UUID: &str = "bd4ac610-0b45-11e3-8ffd-0800200c9a66";

/// Plain channel write characteristic
pub const WRITE_UUID: &str = "bd4ac611-0b45-11e3-8ffd-0800200c9a66";

/// Plain channel read/notify characteristic
pub const READ_UUID: &str = "bd4ac612-0b45-11e3-8ffd-0800200c9a66";

/// Secure channel write characteristic
pub const SECURE_WRITE_UUID: &str = "bd4ac613-0b45-11e3-8ffd-0800200c9a66";

/// Secure channel read/notify characteristic
pub const SECURE_READ_UUID: &str = "bd4ac614-0b45-11e3-8ffd-0800200c9a66";

/// ATT handles of the secure characteristics as seen in HCI captures
pub const SECURE_CAPTURE_HANDLES: [u16; 2] = [38, 41];
