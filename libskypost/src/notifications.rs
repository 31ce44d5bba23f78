//! Notification and thread reading
//!
//! Remote responses are decoded into [`crate::bluesky::types`] at the XRPC
//! boundary; this module flattens them into the records the CLI prints.

use tracing::{debug, error, info, warn};

use crate::bluesky::{BlueskyApi, Notification, PostView, Session};
use crate::error::{PlatformError, Result};

/// Notification reason for a reply to one of the user's posts
pub const REPLY_REASON: &str = "reply";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    /// Author handle
    pub author: String,
    pub reason: String,
    pub cid: String,
    pub uri: String,
    pub text: Option<String>,
}

impl From<Notification> for NotificationRecord {
    fn from(notification: Notification) -> Self {
        Self {
            author: notification.author.handle,
            reason: notification.reason,
            cid: notification.cid,
            uri: notification.uri,
            text: notification.record.text,
        }
    }
}

/// A reply notification the user has not answered yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnansweredReply {
    pub author: String,
    pub text: Option<String>,
    pub cid: String,
    pub uri: String,
}

impl From<NotificationRecord> for UnansweredReply {
    fn from(record: NotificationRecord) -> Self {
        Self {
            author: record.author,
            text: record.text,
            cid: record.cid,
            uri: record.uri,
        }
    }
}

/// A direct reply within a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub text: Option<String>,
    pub author: String,
    pub cid: String,
    pub uri: String,
}

impl From<&PostView> for Response {
    fn from(post: &PostView) -> Self {
        Self {
            text: post.record.text.clone(),
            author: post.author.handle.clone(),
            cid: post.cid.clone(),
            uri: post.uri.clone(),
        }
    }
}

/// One of the user's posts with its direct replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostWithReplies {
    pub uri: String,
    pub text: Option<String>,
    pub reply_count: u64,
    pub replies: Vec<Response>,
}

fn require_session<C: BlueskyApi + ?Sized>(client: &C) -> Result<&Session> {
    client
        .session()
        .ok_or_else(|| PlatformError::NotAuthenticated.into())
}

fn authored_by(post: &PostView, session: &Session) -> bool {
    post.author.handle == session.handle || post.author.did == session.did
}

/// First page of notifications, newest first
pub async fn list_notifications<C>(client: &C, limit: u32) -> Result<Vec<NotificationRecord>>
where
    C: BlueskyApi + ?Sized,
{
    let notifications = client.list_notifications(limit).await.map_err(|e| {
        error!("Failed to list notifications: {}", e);
        e
    })?;

    debug!("Fetched {} notifications", notifications.len());
    Ok(notifications
        .into_iter()
        .map(NotificationRecord::from)
        .collect())
}

/// Direct replies to the post at `post_uri`
pub async fn get_responses<C>(client: &C, post_uri: &str) -> Result<Vec<Response>>
where
    C: BlueskyApi + ?Sized,
{
    let thread = client.get_post_thread(post_uri).await?;
    Ok(thread.direct_replies().map(Response::from).collect())
}

/// The user's recent posts, each with its direct replies
///
/// Threads are only fetched for posts reporting replies. A failed fetch is
/// logged and leaves that post's replies empty.
#[tracing::instrument(skip_all)]
pub async fn list_posts_and_responses<C>(client: &C) -> Result<Vec<PostWithReplies>>
where
    C: BlueskyApi + ?Sized,
{
    let session = require_session(client)?;
    let feed = client.get_author_feed(&session.handle).await?;

    let mut posts = Vec::with_capacity(feed.len());
    for item in feed {
        let post = item.post;
        let reply_count = post.reply_count.unwrap_or(0);

        let replies = if reply_count > 0 {
            get_responses(client, &post.uri).await.unwrap_or_else(|e| {
                warn!("Error fetching replies for {}: {}", post.uri, e);
                Vec::new()
            })
        } else {
            Vec::new()
        };

        posts.push(PostWithReplies {
            uri: post.uri,
            text: post.record.text,
            reply_count,
            replies,
        });
    }

    Ok(posts)
}

/// Reply notifications with no direct reply from the user
///
/// For each reply notification, the thread at the notification's own URI
/// (the reply) is fetched; it counts as answered once one of that thread's
/// direct replies is authored by the session's account. Thread fetch
/// failures are logged per notification and skipped.
///
/// # Errors
///
/// Fails only if there is no session or the notification listing fails.
#[tracing::instrument(skip_all)]
pub async fn list_unanswered<C>(client: &C, limit: u32) -> Result<Vec<UnansweredReply>>
where
    C: BlueskyApi + ?Sized,
{
    let session = require_session(client)?;
    let notifications = list_notifications(client, limit).await?;

    let mut unanswered = Vec::new();
    for record in notifications {
        if record.reason != REPLY_REASON {
            continue;
        }

        let thread = match client.get_post_thread(&record.uri).await {
            Ok(thread) => thread,
            Err(e) => {
                error!("Error processing thread for notification {}: {}", record.uri, e);
                continue;
            }
        };

        let answered = thread
            .direct_replies()
            .any(|reply| authored_by(reply, session));
        if answered {
            debug!("{} already answered", record.uri);
        } else {
            unanswered.push(UnansweredReply::from(record));
        }
    }

    info!("Found {} unanswered replies", unanswered.len());
    Ok(unanswered)
}
