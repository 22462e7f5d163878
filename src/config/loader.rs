use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/viewsync/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("viewsync").join("config.toml")
    }

    /// Loads configuration from the default config file, or defaults when
    /// there is none.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load_from(&path)
    }

    /// Reads, parses and validates the TOML file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The frame size cap is non-zero and fits the 4-byte length prefix
    /// - The RPC timeout is non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = self.transport.max_frame_bytes;
        if max == 0 {
            return Err(ConfigError::ValidationError {
                message: "transport.max_frame_bytes must be greater than zero".to_string(),
            });
        }
        if u32::try_from(max).is_err() {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "transport.max_frame_bytes ({}) exceeds the frame header limit {}",
                    max,
                    u32::MAX
                ),
            });
        }

        if self.rpc.timeout_ms == 0 {
            return Err(ConfigError::ValidationError {
                message: "rpc.timeout_ms must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::DEFAULT_MAX_FRAME_BYTES;
    use std::time::Duration;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, content).expect("write config");
        (dir, path)
    }

    #[test]
    fn empty_file_yields_defaults() {
        let (_dir, path) = write_config("");
        let config = Config::load_from(&path).expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.transport.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
        assert_eq!(config.rpc.timeout(), Duration::from_secs(10));
        assert_eq!(config.resources.fetch_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn sections_override_defaults() {
        let (_dir, path) = write_config(
            r#"
[transport]
socket_path = "/tmp/app.sock"
max_frame_bytes = 1024

[rpc]
timeout_ms = 250

[resources]
cache_dir = "/tmp/viewsync-cache"
"#,
        );
        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.transport.socket_path(), PathBuf::from("/tmp/app.sock"));
        assert_eq!(config.transport.max_frame_bytes, 1024);
        assert_eq!(config.rpc.timeout(), Duration::from_millis(250));
        assert_eq!(
            config.resources.cache_dir,
            Some(PathBuf::from("/tmp/viewsync-cache"))
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let (_dir, path) = write_config("[rpc]\ntimeout_ms = 0\n");
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn zero_frame_size_is_rejected() {
        let mut config = Config::default();
        config.transport.max_frame_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let (_dir, path) = write_config("[rpc\ntimeout_ms = ");
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            Config::load_from(&dir.path().join("absent.toml")),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn default_socket_path_is_per_process() {
        let path = Config::default().transport.socket_path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert_eq!(name, format!("viewsync-{}.sock", std::process::id()));
    }
}
