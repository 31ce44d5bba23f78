//! XRPC-over-HTTPS implementation of [`BlueskyApi`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::bluesky::types::{
    BlobRef, CreatedRecord, FeedViewPost, GetAuthorFeedOutput, GetPostThreadOutput,
    ListNotificationsOutput, Notification, PostRecord, Session, ThreadNode, POST_COLLECTION,
};
use crate::bluesky::BlueskyApi;
use crate::config::BlueskyConfig;
use crate::error::{PlatformError, Result};

/// Error body returned by XRPC endpoints on non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XrpcErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl std::fmt::Display for XrpcErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.error, &self.message) {
            (Some(error), Some(message)) => write!(f, "{}: {}", error, message),
            (Some(error), None) => write!(f, "{}", error),
            (None, Some(message)) => write!(f, "{}", message),
            (None, None) => write!(f, "no error details"),
        }
    }
}

/// Map an XRPC error response to PlatformError
///
/// Classification uses the HTTP status first and the AT Protocol error name
/// second, so a bare status with an empty body still lands in the right
/// bucket.
///
/// # Arguments
///
/// * `status` - HTTP status of the response
/// * `body` - Decoded XRPC error body (may be empty)
/// * `context` - The operation context (e.g., "authentication", "posting")
pub fn map_bluesky_error(status: StatusCode, body: &XrpcErrorBody, context: &str) -> PlatformError {
    let name = body.error.as_deref().unwrap_or_default();
    let detail = format!("{} {}", status.as_u16(), body);

    if context == "authentication"
        && (status == StatusCode::UNAUTHORIZED
            || matches!(name, "AuthenticationRequired" | "AccountNotFound" | "InvalidCredentials"))
    {
        return PlatformError::Authentication(format!(
            "Invalid Bluesky credentials: {}. Please check your handle and app password.",
            detail
        ));
    }

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || matches!(name, "AuthenticationRequired" | "InvalidToken" | "ExpiredToken")
    {
        return PlatformError::Authentication(format!(
            "Bluesky authentication failed during {}: {}. Please check your credentials and re-authenticate.",
            context, detail
        ));
    }

    if status == StatusCode::TOO_MANY_REQUESTS || name == "RateLimitExceeded" {
        return PlatformError::RateLimit(format!(
            "Bluesky rate limit exceeded during {}: {}. Please wait before trying again.",
            context, detail
        ));
    }

    if status == StatusCode::BAD_REQUEST
        || matches!(name, "InvalidRequest" | "InvalidRecord" | "BlobTooLarge")
    {
        return PlatformError::Validation(format!(
            "Bluesky rejected the request during {}: {}. Check content format and length.",
            context, detail
        ));
    }

    if matches!(status.as_u16(), 502..=504) {
        return PlatformError::Network(format!(
            "Bluesky PDS unavailable during {}: {}. Check PDS availability.",
            context, detail
        ));
    }

    PlatformError::Posting(format!(
        "Bluesky operation failed during {}: {}",
        context, detail
    ))
}

fn map_transport_error(error: reqwest::Error, context: &str) -> PlatformError {
    if error.is_decode() {
        return PlatformError::InvalidResponse(format!(
            "Unexpected Bluesky response during {}: {}",
            context, error
        ));
    }
    let kind = if error.is_timeout() {
        "request timed out"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    PlatformError::Network(format!(
        "Network error while connecting to Bluesky PDS during {} ({}): {}. Check your internet connection.",
        context, kind, error
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionOutput {
    did: String,
    handle: String,
    access_jwt: String,
}

#[derive(Serialize)]
struct CreateSessionInput<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CreateRecordInput<'a> {
    repo: &'a str,
    collection: &'a str,
    record: &'a PostRecord,
}

#[derive(Deserialize)]
struct UploadBlobOutput {
    blob: BlobRef,
}

#[derive(Debug)]
struct AuthState {
    session: Session,
    access_jwt: SecretString,
}

/// Bluesky client speaking XRPC to a single PDS
#[derive(Debug)]
pub struct XrpcClient {
    http: reqwest::Client,
    service_url: String,
    auth: Option<AuthState>,
}

impl XrpcClient {
    /// Create a client for the PDS named in `config`
    ///
    /// No network traffic happens until [`login`](BlueskyApi::login).
    pub fn new(config: &BlueskyConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("skypost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            service_url: config.service_url.trim_end_matches('/').to_string(),
            auth: None,
        })
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service_url, nsid)
    }

    fn access_token(&self) -> Result<&str> {
        self.auth
            .as_ref()
            .map(|auth| auth.access_jwt.expose_secret())
            .ok_or_else(|| PlatformError::NotAuthenticated.into())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, context: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| map_transport_error(e, context).into());
        }

        let text = response.text().await.unwrap_or_default();
        let body: XrpcErrorBody = serde_json::from_str(&text).unwrap_or_else(|_| XrpcErrorBody {
            error: None,
            message: (!text.trim().is_empty()).then(|| text.trim().to_string()),
        });
        tracing::debug!("XRPC {} failed with {}: {}", context, status, body);
        Err(map_bluesky_error(status, &body, context).into())
    }

    async fn query<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, String)],
        context: &str,
    ) -> Result<T> {
        let request = self
            .http
            .get(self.endpoint(nsid))
            .bearer_auth(self.access_token()?)
            .query(params);
        self.send(request, context).await
    }

    async fn procedure<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        nsid: &str,
        body: &B,
        context: &str,
    ) -> Result<T> {
        let request = self
            .http
            .post(self.endpoint(nsid))
            .bearer_auth(self.access_token()?)
            .json(body);
        self.send(request, context).await
    }
}

#[async_trait]
impl BlueskyApi for XrpcClient {
    async fn login(&mut self, identifier: &str, password: &SecretString) -> Result<Session> {
        tracing::debug!("Creating Bluesky session for handle: {}", identifier);

        let request = self
            .http
            .post(self.endpoint("com.atproto.server.createSession"))
            .json(&CreateSessionInput {
                identifier,
                password: password.expose_secret(),
            });
        let output: CreateSessionOutput = self.send(request, "authentication").await?;

        let session = Session {
            did: output.did,
            handle: output.handle,
        };
        self.auth = Some(AuthState {
            session: session.clone(),
            access_jwt: SecretString::from(output.access_jwt),
        });
        tracing::debug!("Bluesky session created for {}", session.did);

        Ok(session)
    }

    fn session(&self) -> Option<&Session> {
        self.auth.as_ref().map(|auth| &auth.session)
    }

    async fn upload_blob(&self, data: Vec<u8>, mime_type: &str) -> Result<BlobRef> {
        tracing::debug!("Uploading {} byte blob ({})", data.len(), mime_type);

        let request = self
            .http
            .post(self.endpoint("com.atproto.repo.uploadBlob"))
            .bearer_auth(self.access_token()?)
            .header(CONTENT_TYPE, mime_type)
            .body(data);
        let output: UploadBlobOutput = self.send(request, "uploading image").await?;

        Ok(output.blob)
    }

    async fn create_post(&self, repo: &str, record: &PostRecord) -> Result<CreatedRecord> {
        tracing::debug!("Posting to Bluesky: {} characters", record.text.chars().count());

        let created: CreatedRecord = self
            .procedure(
                "com.atproto.repo.createRecord",
                &CreateRecordInput {
                    repo,
                    collection: POST_COLLECTION,
                    record,
                },
                "posting",
            )
            .await?;

        tracing::debug!("Posted to Bluesky: {}", created.uri);
        Ok(created)
    }

    async fn list_notifications(&self, limit: u32) -> Result<Vec<Notification>> {
        let output: ListNotificationsOutput = self
            .query(
                "app.bsky.notification.listNotifications",
                &[("limit", limit.to_string())],
                "listing notifications",
            )
            .await?;
        Ok(output.notifications)
    }

    async fn get_post_thread(&self, uri: &str) -> Result<ThreadNode> {
        let output: GetPostThreadOutput = self
            .query(
                "app.bsky.feed.getPostThread",
                &[("uri", uri.to_string())],
                "fetching thread",
            )
            .await?;
        Ok(output.thread)
    }

    async fn get_author_feed(&self, actor: &str) -> Result<Vec<FeedViewPost>> {
        let output: GetAuthorFeedOutput = self
            .query(
                "app.bsky.feed.getAuthorFeed",
                &[("actor", actor.to_string())],
                "fetching author feed",
            )
            .await?;
        Ok(output.feed)
    }
}
