//! Skypost - a command-line client for Bluesky
//!
//! This library holds everything behind the `skypost` binary: credential
//! storage, image normalization, hashtag facets, post composition, and
//! notification reading, all against the [`bluesky::BlueskyApi`] seam.

pub mod bluesky;
pub mod composer;
pub mod config;
pub mod credentials;
pub mod error;
pub mod facets;
pub mod image;
pub mod logging;
pub mod notifications;

// Re-export commonly used types
pub use bluesky::{authenticate, BlueskyApi};
pub use composer::PostDraft;
pub use config::Config;
pub use credentials::{ClearOutcome, CredentialManager};
pub use error::{Result, SkypostError};
pub use facets::{extract_hashtags, Facet};
