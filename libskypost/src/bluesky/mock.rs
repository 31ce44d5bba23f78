//! In-memory Bluesky client for testing
//!
//! `MockClient` serves canned notifications, threads, and feed posts, and
//! records every call so tests can assert on what reached the "network".
//! It's available in all builds so integration tests can use it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::bluesky::types::{
    Author, BlobRef, CidLink, CreatedRecord, FeedViewPost, Notification, PostRecord, PostView,
    RecordText, Session, ThreadNode, ThreadViewPost,
};
use crate::bluesky::BlueskyApi;
use crate::error::{PlatformError, Result};

/// A blob uploaded through the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub size: usize,
    pub mime_type: String,
}

/// Mock Bluesky client
#[derive(Debug, Clone)]
pub struct MockClient {
    handle: String,
    did: String,
    session: Option<Session>,
    password: Option<String>,
    notifications: Vec<Notification>,
    notifications_error: Option<PlatformError>,
    threads: HashMap<String, std::result::Result<ThreadNode, PlatformError>>,
    feed: Vec<FeedViewPost>,
    upload_error: Option<PlatformError>,
    post_error: Option<PlatformError>,

    /// Names of every remote call made, in order
    calls: Arc<Mutex<Vec<String>>>,
    uploads: Arc<Mutex<Vec<Upload>>>,
    created: Arc<Mutex<Vec<(String, PostRecord)>>>,
    thread_requests: Arc<Mutex<Vec<String>>>,
}

impl MockClient {
    /// A client for `handle` that has not logged in yet
    pub fn new(handle: &str) -> Self {
        Self {
            handle: handle.to_string(),
            did: format!("did:plc:{}", handle.split('.').next().unwrap_or(handle)),
            session: None,
            password: None,
            notifications: Vec::new(),
            notifications_error: None,
            threads: HashMap::new(),
            feed: Vec::new(),
            upload_error: None,
            post_error: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            uploads: Arc::new(Mutex::new(Vec::new())),
            created: Arc::new(Mutex::new(Vec::new())),
            thread_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A client already logged in as `handle`
    pub fn authenticated(handle: &str) -> Self {
        let mut client = Self::new(handle);
        client.session = Some(Session {
            did: client.did.clone(),
            handle: client.handle.clone(),
        });
        client
    }

    /// Only accept `password` at login
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_notification(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    pub fn with_notifications_error(mut self, error: PlatformError) -> Self {
        self.notifications_error = Some(error);
        self
    }

    pub fn with_thread(mut self, uri: &str, thread: ThreadNode) -> Self {
        self.threads.insert(uri.to_string(), Ok(thread));
        self
    }

    pub fn with_thread_error(mut self, uri: &str, error: PlatformError) -> Self {
        self.threads.insert(uri.to_string(), Err(error));
        self
    }

    /// Feed items come back unfiltered; an author feed also carries reposts
    pub fn with_feed_post(mut self, post: PostView) -> Self {
        self.feed.push(FeedViewPost { post });
        self
    }

    pub fn failing_upload(mut self, error: PlatformError) -> Self {
        self.upload_error = Some(error);
        self
    }

    pub fn failing_post(mut self, error: PlatformError) -> Self {
        self.post_error = Some(error);
        self
    }

    /// Number of remote calls made so far
    pub fn network_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    /// Records passed to `create_post`, with the repo they were filed under
    pub fn created_posts(&self) -> Vec<(String, PostRecord)> {
        self.created.lock().unwrap().clone()
    }

    /// URIs passed to `get_post_thread`, in order
    pub fn thread_requests(&self) -> Vec<String> {
        self.thread_requests.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn require_session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| PlatformError::NotAuthenticated.into())
    }
}

#[async_trait]
impl BlueskyApi for MockClient {
    async fn login(&mut self, identifier: &str, password: &SecretString) -> Result<Session> {
        self.record("login");

        let accepted = identifier == self.handle
            && self
                .password
                .as_deref()
                .map_or(true, |expected| expected == password.expose_secret());
        if !accepted {
            return Err(PlatformError::Authentication(
                "Invalid Bluesky credentials: 401 AuthenticationRequired".to_string(),
            )
            .into());
        }

        let session = Session {
            did: self.did.clone(),
            handle: self.handle.clone(),
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    async fn upload_blob(&self, data: Vec<u8>, mime_type: &str) -> Result<BlobRef> {
        self.record("upload_blob");
        self.require_session()?;
        if let Some(error) = &self.upload_error {
            return Err(error.clone().into());
        }

        self.uploads.lock().unwrap().push(Upload {
            size: data.len(),
            mime_type: mime_type.to_string(),
        });
        Ok(BlobRef {
            blob_type: "blob".to_string(),
            link: CidLink {
                link: format!("bafkmock{}", data.len()),
            },
            mime_type: mime_type.to_string(),
            size: data.len() as u64,
        })
    }

    async fn create_post(&self, repo: &str, record: &PostRecord) -> Result<CreatedRecord> {
        self.record("create_post");
        self.require_session()?;
        if let Some(error) = &self.post_error {
            return Err(error.clone().into());
        }

        let mut created = self.created.lock().unwrap();
        created.push((repo.to_string(), record.clone()));
        Ok(CreatedRecord {
            uri: format!("at://{}/app.bsky.feed.post/mock{}", repo, created.len()),
            cid: format!("bafyreimock{}", created.len()),
        })
    }

    async fn list_notifications(&self, limit: u32) -> Result<Vec<Notification>> {
        self.record("list_notifications");
        self.require_session()?;
        if let Some(error) = &self.notifications_error {
            return Err(error.clone().into());
        }
        Ok(self
            .notifications
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_post_thread(&self, uri: &str) -> Result<ThreadNode> {
        self.record("get_post_thread");
        self.require_session()?;
        self.thread_requests.lock().unwrap().push(uri.to_string());

        match self.threads.get(uri) {
            Some(Ok(thread)) => Ok(thread.clone()),
            Some(Err(error)) => Err(error.clone().into()),
            None => Err(PlatformError::Validation(format!(
                "Bluesky rejected the request during fetching thread: 400 NotFound: Post not found: {}",
                uri
            ))
            .into()),
        }
    }

    async fn get_author_feed(&self, _actor: &str) -> Result<Vec<FeedViewPost>> {
        self.record("get_author_feed");
        self.require_session()?;
        Ok(self.feed.clone())
    }
}

// ============================================================================
// Fixture builders
// ============================================================================

fn author(handle: &str) -> Author {
    Author {
        did: format!("did:plc:{}", handle.split('.').next().unwrap_or(handle)),
        handle: handle.to_string(),
        display_name: None,
    }
}

/// A notification from `author_handle`
pub fn notification(author_handle: &str, reason: &str, uri: &str, cid: &str, text: Option<&str>) -> Notification {
    Notification {
        uri: uri.to_string(),
        cid: cid.to_string(),
        author: author(author_handle),
        reason: reason.to_string(),
        reason_subject: None,
        record: RecordText {
            text: text.map(str::to_string),
        },
        is_read: false,
        indexed_at: String::new(),
    }
}

/// A post by `author_handle`
pub fn post_view(author_handle: &str, uri: &str, text: &str) -> PostView {
    PostView {
        uri: uri.to_string(),
        cid: format!("cid-{}", uri.rsplit('/').next().unwrap_or(uri)),
        author: author(author_handle),
        record: RecordText {
            text: Some(text.to_string()),
        },
        reply_count: Some(0),
        indexed_at: String::new(),
    }
}

/// A thread rooted at `root` with the given direct replies
pub fn thread(mut root: PostView, replies: Vec<PostView>) -> ThreadNode {
    root.reply_count = Some(replies.len() as u64);
    ThreadNode::Post(ThreadViewPost {
        post: root,
        replies: replies
            .into_iter()
            .map(|post| {
                ThreadNode::Post(ThreadViewPost {
                    post,
                    replies: Vec::new(),
                })
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkypostError;

    #[tokio::test]
    async fn test_login_checks_password() {
        let mut client = MockClient::new("me.bsky.social").with_password("hunter2");

        let wrong = SecretString::from("nope".to_string());
        assert!(matches!(
            client.login("me.bsky.social", &wrong).await,
            Err(SkypostError::Platform(PlatformError::Authentication(_)))
        ));
        assert!(client.session().is_none());

        let right = SecretString::from("hunter2".to_string());
        let session = client.login("me.bsky.social", &right).await.unwrap();
        assert_eq!(session.handle, "me.bsky.social");
        assert_eq!(client.session(), Some(&session));
    }

    #[tokio::test]
    async fn test_unauthenticated_calls_fail() {
        let client = MockClient::new("me.bsky.social");
        let result = client.list_notifications(10).await;
        assert!(matches!(
            result,
            Err(SkypostError::Platform(PlatformError::NotAuthenticated))
        ));
        assert_eq!(client.calls(), ["list_notifications"]);
    }

    #[tokio::test]
    async fn test_clones_share_call_log() {
        let client = MockClient::authenticated("me.bsky.social");
        let observer = client.clone();

        client.get_author_feed("me.bsky.social").await.unwrap();
        assert_eq!(observer.network_calls(), 1);
    }

    #[test]
    fn test_thread_fixture_sets_reply_count() {
        let root = post_view("me.bsky.social", "at://me/post/1", "root");
        let node = thread(root, vec![post_view("x.bsky.social", "at://x/post/2", "hi")]);

        match &node {
            ThreadNode::Post(view) => assert_eq!(view.post.reply_count, Some(1)),
            other => panic!("unexpected node {:?}", other),
        }
        assert_eq!(node.direct_replies().count(), 1);
    }
}
