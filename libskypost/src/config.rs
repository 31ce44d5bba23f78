//! Configuration management for Skypost

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Keyring service name credentials are filed under
pub const SERVICE_NAME: &str = "Bluesky";

/// Handle used when neither `--username` nor the config file names one
pub const DEFAULT_USERNAME: &str = "jetsetjaxon.bsky.social";

/// Default PDS host for XRPC calls
pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";

/// Bluesky post character limit
pub const MAX_POST_LENGTH: usize = 300;

/// Images above this many bytes are re-encoded before upload
pub const MAX_IMAGE_SIZE: u64 = 1_000_000;

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub bluesky: BlueskyConfig,
    pub credentials: CredentialsConfig,
    pub image: ImageConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlueskyConfig {
    pub service_url: String,
    pub username: String,
    pub timeout_secs: u64,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub service_name: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageConfig {
    /// Size in bytes above which an image is converted to JPEG
    pub max_size: u64,
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_size: MAX_IMAGE_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationsConfig {
    pub limit: u32,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_NOTIFICATION_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file at the XDG location is not an error; built-in defaults
    /// are used instead. A path named through `SKYPOST_CONFIG` must exist.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("SKYPOST_CONFIG") {
            return Self::load_from_path(&expand(&path));
        }

        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load from `path` (tilde-expanded) if given, else from the default
    /// location
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(&expand(&path.to_string_lossy())),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.image.jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                field: "image.jpeg_quality".to_string(),
                reason: format!("{} is outside 1-100", self.image.jpeg_quality),
            }
            .into());
        }
        if !(1..=100).contains(&self.notifications.limit) {
            return Err(ConfigError::InvalidValue {
                field: "notifications.limit".to_string(),
                reason: format!("{} is outside 1-100", self.notifications.limit),
            }
            .into());
        }
        if self.bluesky.service_url.trim().is_empty() {
            return Err(ConfigError::MissingField("bluesky.service_url".to_string()).into());
        }
        Ok(())
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("skypost").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[notifications]\nlimit = 5\n").unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.notifications.limit, 5);
        assert_eq!(config.image, ImageConfig::default());

        let missing = dir.path().join("missing.toml");
        assert!(Config::load_from(Some(&missing)).is_err());
    }

    #[test]
    fn test_defaults_match_service_limits() {
        let config = Config::default();
        assert_eq!(config.bluesky.service_url, "https://bsky.social");
        assert_eq!(config.credentials.service_name, "Bluesky");
        assert_eq!(config.image.max_size, 1_000_000);
        assert_eq!(config.image.jpeg_quality, 85);
        assert_eq!(config.notifications.limit, 50);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[bluesky]
username = "alice.bsky.social"

[image]
jpeg_quality = 70
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.bluesky.username, "alice.bsky.social");
        assert_eq!(config.bluesky.service_url, DEFAULT_SERVICE_URL);
        assert_eq!(config.image.jpeg_quality, 70);
        assert_eq!(config.image.max_size, MAX_IMAGE_SIZE);
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[image]\njpeg_quality = 0\n").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("image.jpeg_quality"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[bluesky\nusername = ").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    #[serial]
    fn test_env_override_path_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        std::env::set_var("SKYPOST_CONFIG", &missing);

        let result = Config::load();
        std::env::remove_var("SKYPOST_CONFIG");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    #[serial]
    fn test_env_override_path_is_loaded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(&path, "[notifications]\nlimit = 10\n").unwrap();
        std::env::set_var("SKYPOST_CONFIG", &path);

        let result = Config::load();
        std::env::remove_var("SKYPOST_CONFIG");

        assert_eq!(result.unwrap().notifications.limit, 10);
    }
}
