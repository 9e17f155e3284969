extern crate self as deadbolt_hub;

pub mod http;
mod hub;

pub use hub::{Hub, UnlockError, discover};
