//! Error types for Skypost

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkypostError>;

#[derive(Error, Debug)]
pub enum SkypostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("{0}")]
    Validation(String),

    #[error("Image file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("OS keyring unavailable: {0}")]
    KeyringUnavailable(String),

    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Not a valid image file: {}", .0.display())]
    InvalidImage(PathBuf),

    #[error("Error converting image {}: {source}", .path.display())]
    Conversion {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Request rejected: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
