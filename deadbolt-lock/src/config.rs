//! Tool configuration, a camelCase JSON file
//!
//! ```json
//! {
//!     "offlineKey": "000102030405060708090a0b0c0d0e0f",
//!     "offlineKeyOffset": 1,
//!     "lockUuid": "c8:3a:2f:01:02:03",
//!     "port": 3000
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use deadbolt_proto::{Key, ProtoError};

use crate::LockConfig;

pub const CONFIG_ENV: &str = "DEADBOLT_CONFIG";
pub const CONFIG_FILE_NAME: &str = "deadbolt.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration file: pass --config or set {CONFIG_ENV}")]
    NotFound,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid offlineKey: {0}")]
    OfflineKey(ProtoError),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// 32 hex characters
    pub offline_key: String,
    pub offline_key_offset: u8,
    /// Peripheral id, address or name fragment of the lock. Any lock when
    /// absent.
    #[serde(default)]
    pub lock_uuid: Option<String>,
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: u64,
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,
}

fn default_address() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_response_timeout() -> u64 {
    10
}

fn default_scan_timeout() -> u64 {
    30
}

impl Config {
    /// Load from `path`, else from `$DEADBOLT_CONFIG`, else from
    /// `deadbolt.json` in the user's config directory.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_path().ok_or(ConfigError::NotFound)?,
        };
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::read(&path)
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.offline_key()?;
        Ok(config)
    }

    pub fn offline_key(&self) -> Result<Key, ConfigError> {
        Key::from_hex(&self.offline_key).map_err(ConfigError::OfflineKey)
    }

    pub fn lock_config(&self) -> Result<LockConfig, ConfigError> {
        Ok(LockConfig {
            offline_key: self.offline_key()?,
            offline_key_index: self.offline_key_offset,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            response_timeout: Duration::from_secs(self.response_timeout_secs),
        })
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

fn default_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f";

    fn write(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("deadbolt-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults() {
        let config: Config =
            serde_json::from_str(&format!(r#"{{"offlineKey":"{KEY}","offlineKeyOffset":1}}"#))
                .unwrap();
        assert_eq!(config.lock_uuid, None);
        assert_eq!(config.listen_addr(), "localhost:3000");
        assert_eq!(config.scan_timeout(), Duration::from_secs(30));

        let lock = config.lock_config().unwrap();
        assert_eq!(lock.offline_key_index, 1);
        assert_eq!(lock.connect_timeout, Duration::from_secs(30));
        assert_eq!(lock.response_timeout, Duration::from_secs(10));
        assert_eq!(lock.offline_key.as_bytes()[15], 0x0f);
    }

    #[test]
    fn offset_zero_is_a_valid_slot() {
        let path = write(
            "zero.json",
            &format!(r#"{{"offlineKey":"{KEY}","offlineKeyOffset":0,"lockUuid":"front door"}}"#),
        );
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.offline_key_offset, 0);
        assert_eq!(config.lock_uuid.as_deref(), Some("front door"));
    }

    #[test]
    fn missing_offset_is_rejected() {
        let path = write("no-offset.json", &format!(r#"{{"offlineKey":"{KEY}"}}"#));
        assert!(matches!(Config::read(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn offset_out_of_range_is_rejected() {
        let path = write(
            "big-offset.json",
            &format!(r#"{{"offlineKey":"{KEY}","offlineKeyOffset":256}}"#),
        );
        assert!(matches!(Config::read(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn bad_key_is_rejected() {
        let path = write(
            "short-key.json",
            r#"{"offlineKey":"0001","offlineKeyOffset":1}"#,
        );
        assert!(matches!(Config::read(&path), Err(ConfigError::OfflineKey(_))));

        let path = write(
            "not-hex.json",
            r#"{"offlineKey":"zz0102030405060708090a0b0c0d0e0f","offlineKeyOffset":1}"#,
        );
        assert!(matches!(Config::read(&path), Err(ConfigError::OfflineKey(_))));
    }

    #[test]
    fn missing_file() {
        let path = std::env::temp_dir().join("deadbolt-config-does-not-exist.json");
        assert!(matches!(Config::read(&path), Err(ConfigError::Read { .. })));
    }
}
