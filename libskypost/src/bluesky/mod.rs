//! Bluesky network client seam
//!
//! Everything Skypost needs from the AT Protocol service goes through the
//! [`BlueskyApi`] trait. [`xrpc::XrpcClient`] implements it over HTTPS against
//! a PDS; [`mock::MockClient`] implements it in memory for tests.
//!
//! # Examples
//!
//! ```no_run
//! use libskypost::bluesky::{BlueskyApi, xrpc::XrpcClient};
//! use libskypost::config::BlueskyConfig;
//! use secrecy::SecretString;
//!
//! # async fn example() -> libskypost::error::Result<()> {
//! let mut client = XrpcClient::new(&BlueskyConfig::default())?;
//! let password = SecretString::from("app-password".to_string());
//! let session = client.login("alice.bsky.social", &password).await?;
//! println!("Logged in as {}", session.handle);
//!
//! for notification in client.list_notifications(50).await? {
//!     println!("{}: {}", notification.author.handle, notification.reason);
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::Result;

pub mod mock;
pub mod types;
pub mod xrpc;

pub use types::{
    BlobRef, CreatedRecord, FeedViewPost, Notification, PostRecord, PostView, ReplyRef, Session,
    ThreadNode,
};

/// Remote calls against a Bluesky account
///
/// All methods except [`login`](BlueskyApi::login) require an established
/// session and fail with `PlatformError::NotAuthenticated` otherwise.
#[async_trait]
pub trait BlueskyApi: Send + Sync {
    /// Create a session for `identifier` (handle or email)
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the service rejects the
    /// credentials.
    async fn login(&mut self, identifier: &str, password: &SecretString) -> Result<Session>;

    /// The current session, if [`login`](BlueskyApi::login) has succeeded
    fn session(&self) -> Option<&Session>;

    /// Upload binary content and return the blob reference to embed
    async fn upload_blob(&self, data: Vec<u8>, mime_type: &str) -> Result<BlobRef>;

    /// Create an `app.bsky.feed.post` record in `repo` (a DID)
    async fn create_post(&self, repo: &str, record: &PostRecord) -> Result<CreatedRecord>;

    /// First page of the account's notifications, newest first
    async fn list_notifications(&self, limit: u32) -> Result<Vec<Notification>>;

    /// The thread rooted at `uri`
    async fn get_post_thread(&self, uri: &str) -> Result<ThreadNode>;

    /// First page of posts authored by `actor` (handle or DID)
    async fn get_author_feed(&self, actor: &str) -> Result<Vec<FeedViewPost>>;
}

/// Log in as `username` and announce the result
///
/// # Errors
///
/// Returns whatever [`BlueskyApi::login`] returns; the failure is logged
/// first.
pub async fn authenticate<C>(client: &mut C, username: &str, password: &SecretString) -> Result<Session>
where
    C: BlueskyApi + ?Sized,
{
    match client.login(username, password).await {
        Ok(session) => {
            tracing::info!("Authenticated as {} ({})", session.handle, session.did);
            println!("Successfully authenticated as {}", username);
            Ok(session)
        }
        Err(e) => {
            tracing::error!("Authentication failed for {}: {}", username, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PlatformError, SkypostError};

    #[tokio::test]
    async fn test_authenticate_establishes_session() {
        let mut client = mock::MockClient::new("me.bsky.social").with_password("pw");
        let password = SecretString::from("pw".to_string());

        let session = authenticate(&mut client, "me.bsky.social", &password)
            .await
            .unwrap();

        assert_eq!(session.did, "did:plc:me");
        assert!(client.session().is_some());
    }

    #[tokio::test]
    async fn test_authenticate_propagates_rejection() {
        let mut client = mock::MockClient::new("me.bsky.social").with_password("pw");
        let password = SecretString::from("wrong".to_string());

        let result = authenticate(&mut client, "me.bsky.social", &password).await;

        assert!(matches!(
            result,
            Err(SkypostError::Platform(PlatformError::Authentication(_)))
        ));
    }
}
