//! Post composition and submission
//!
//! [`submit`] turns a [`PostDraft`] into an `app.bsky.feed.post` record and
//! files it through a [`BlueskyApi`] client. [`post`] is the user-facing
//! wrapper the CLI calls: it reports the outcome and never fails.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use tracing::{error, info};

use crate::bluesky::types::{ImagesEmbed, PostReply, RichTextFacet};
use crate::bluesky::{BlueskyApi, CreatedRecord, PostRecord, ReplyRef};
use crate::config::{ImageConfig, MAX_POST_LENGTH};
use crate::error::{PlatformError, Result, SkypostError};
use crate::facets::extract_hashtags;

/// Alt text used when none is given for an attached image
pub const DEFAULT_ALT_TEXT: &str = "Image";

pub const EMPTY_POST_MESSAGE: &str = "Please provide text content or an image to post.";

/// A post waiting to be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub text: String,
    pub image: Option<PathBuf>,
    pub alt_text: String,
    pub reply_to: Option<ReplyRef>,
}

impl PostDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
            alt_text: DEFAULT_ALT_TEXT.to_string(),
            reply_to: None,
        }
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>, alt_text: impl Into<String>) -> Self {
        self.image = Some(path.into());
        self.alt_text = alt_text.into();
        self
    }

    pub fn in_reply_to(mut self, reply_to: ReplyRef) -> Self {
        self.reply_to = Some(reply_to);
        self
    }

    /// Neither text nor an image to publish
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.image.is_none()
    }
}

/// Reject text longer than [`MAX_POST_LENGTH`] characters
///
/// Length is counted in Unicode scalar values, not bytes.
pub fn validate_text(text: &str) -> Result<()> {
    if text.chars().count() > MAX_POST_LENGTH {
        return Err(SkypostError::Validation(format!(
            "Text exceeds the maximum allowed length of {} characters.",
            MAX_POST_LENGTH
        )));
    }
    Ok(())
}

/// Build and publish a post
///
/// Validation happens before anything touches the network. An attached
/// image is normalized per `image_config`, uploaded, and embedded with the
/// draft's alt text. Replies reference the target post as both parent and
/// root.
///
/// # Errors
///
/// - `SkypostError::InvalidInput` if there is neither text nor an image
/// - `SkypostError::Validation` if the text is too long
/// - `SkypostError::NotFound` if the image path does not exist
/// - `SkypostError::Image` if the image cannot be converted
/// - `PlatformError::NotAuthenticated` if the client has no session
/// - any other `PlatformError` the client raises
#[tracing::instrument(skip_all, fields(chars = draft.text.chars().count()))]
pub async fn submit<C>(
    client: &C,
    draft: &PostDraft,
    image_config: &ImageConfig,
) -> Result<CreatedRecord>
where
    C: BlueskyApi + ?Sized,
{
    if draft.is_empty() {
        return Err(SkypostError::InvalidInput(EMPTY_POST_MESSAGE.to_string()));
    }
    validate_text(&draft.text)?;

    let embed = match &draft.image {
        Some(path) => {
            let upload_path = crate::image::normalize(path, image_config)?;
            let data = tokio::fs::read(&upload_path)
                .await
                .map_err(|source| crate::error::ImageError::Io {
                    path: upload_path.clone(),
                    source,
                })?;
            let mime_type = crate::image::mime_type(&upload_path, &data);

            info!(
                "Uploading {} ({} bytes, {})",
                upload_path.display(),
                data.len(),
                mime_type
            );
            let blob = client.upload_blob(data, mime_type).await?;
            Some(ImagesEmbed::single(blob, &draft.alt_text))
        }
        None => None,
    };

    let mut record = PostRecord::new(
        &draft.text,
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    record.facets = extract_hashtags(&draft.text)
        .iter()
        .map(RichTextFacet::from)
        .collect();
    record.embed = embed;
    record.reply = draft.reply_to.as_ref().map(PostReply::flat);

    let session = client.session().ok_or(PlatformError::NotAuthenticated)?;
    let created = client.create_post(&session.did, &record).await?;

    info!("Created post {}", created.uri);
    Ok(created)
}

/// Publish a post and report the outcome on stdout
///
/// Returns whether the post was created. Failures are logged and printed,
/// never returned.
pub async fn post<C>(client: &C, draft: &PostDraft, image_config: &ImageConfig) -> bool
where
    C: BlueskyApi + ?Sized,
{
    match submit(client, draft, image_config).await {
        Ok(_) => {
            println!("Post successfully published!");
            true
        }
        Err(
            e @ (SkypostError::Validation(_)
            | SkypostError::NotFound(_)
            | SkypostError::InvalidInput(_)),
        ) => {
            error!("{}", e);
            println!("{}", e);
            false
        }
        Err(e) => {
            error!("Post error: {:?}", e);
            println!("Post error: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluesky::mock::MockClient;
    use crate::bluesky::types::FacetFeature;
    use tempfile::TempDir;

    const ME: &str = "me.bsky.social";

    #[test]
    fn test_validate_text_boundary() {
        assert!(validate_text(&"a".repeat(300)).is_ok());

        let err = validate_text(&"a".repeat(301)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Text exceeds the maximum allowed length of 300 characters."
        );
    }

    #[test]
    fn test_validate_text_counts_characters_not_bytes() {
        // 300 four-byte characters
        assert!(validate_text(&"🦋".repeat(300)).is_ok());
        assert!(validate_text(&"é".repeat(301)).is_err());
    }

    #[tokio::test]
    async fn test_submit_text_post() {
        let client = MockClient::authenticated(ME);
        let draft = PostDraft::new("Hello #BlueSky and #Rust");

        let created = submit(&client, &draft, &ImageConfig::default())
            .await
            .unwrap();
        assert!(created.uri.starts_with("at://did:plc:me/"));

        let posts = client.created_posts();
        assert_eq!(posts.len(), 1);
        let (repo, record) = &posts[0];
        assert_eq!(repo, "did:plc:me");
        assert_eq!(record.text, "Hello #BlueSky and #Rust");
        assert!(record.embed.is_none());
        assert!(record.reply.is_none());

        let tags: Vec<_> = record
            .facets
            .iter()
            .flat_map(|facet| facet.features.iter())
            .map(|FacetFeature::Tag { tag }| tag.as_str())
            .collect();
        assert_eq!(tags, ["BlueSky", "Rust"]);
        assert_eq!(record.facets[0].index.byte_start, 6);
        assert_eq!(record.facets[0].index.byte_end, 14);
    }

    #[tokio::test]
    async fn test_created_at_is_rfc3339_utc() {
        let client = MockClient::authenticated(ME);
        submit(&client, &PostDraft::new("hi"), &ImageConfig::default())
            .await
            .unwrap();

        let (_, record) = &client.created_posts()[0];
        assert!(record.created_at.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&record.created_at).is_ok());
    }

    #[tokio::test]
    async fn test_empty_draft_without_image_is_rejected() {
        let client = MockClient::authenticated(ME);

        let result = submit(&client, &PostDraft::new(""), &ImageConfig::default()).await;

        assert!(matches!(result, Err(SkypostError::InvalidInput(ref msg)) if msg == EMPTY_POST_MESSAGE));
        assert_eq!(client.network_calls(), 0);
        assert!(!post(&client, &PostDraft::new(""), &ImageConfig::default()).await);
        assert!(client.created_posts().is_empty());
    }

    #[test]
    fn test_draft_with_only_an_image_is_not_empty() {
        assert!(PostDraft::new("").is_empty());
        assert!(!PostDraft::new("").with_image("cat.png", "a cat").is_empty());
        assert!(!PostDraft::new(" ").is_empty());
    }

    #[tokio::test]
    async fn test_overlong_text_never_reaches_network() {
        let client = MockClient::authenticated(ME);
        let draft = PostDraft::new("x".repeat(301));

        let result = submit(&client, &draft, &ImageConfig::default()).await;

        assert!(matches!(result, Err(SkypostError::Validation(_))));
        assert_eq!(client.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_reply_sets_parent_and_root() {
        let client = MockClient::authenticated(ME);
        let target = ReplyRef {
            uri: "at://did:plc:bob/app.bsky.feed.post/3k".to_string(),
            cid: "bafyreibob".to_string(),
        };
        let draft = PostDraft::new("agreed").in_reply_to(target.clone());

        submit(&client, &draft, &ImageConfig::default())
            .await
            .unwrap();

        let (_, record) = &client.created_posts()[0];
        let reply = record.reply.as_ref().unwrap();
        assert_eq!(reply.parent, target);
        assert_eq!(reply.root, target);
    }

    #[tokio::test]
    async fn test_small_image_is_uploaded_and_embedded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cat.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();
        let size = std::fs::metadata(&path).unwrap().len() as usize;

        let client = MockClient::authenticated(ME);
        let draft = PostDraft::new("look").with_image(&path, "a cat");

        submit(&client, &draft, &ImageConfig::default())
            .await
            .unwrap();

        let uploads = client.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].size, size);
        assert_eq!(uploads[0].mime_type, "image/png");

        let (_, record) = &client.created_posts()[0];
        let embed = record.embed.as_ref().unwrap();
        assert_eq!(embed.images.len(), 1);
        assert_eq!(embed.images[0].alt, "a cat");
        assert_eq!(embed.images[0].image.size, size as u64);
        assert_eq!(client.calls(), ["upload_blob", "create_post"]);
    }

    #[tokio::test]
    async fn test_oversized_image_uploads_converted_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([9, 9, 9]))
            .save(&path)
            .unwrap();
        let config = ImageConfig {
            max_size: 1,
            ..ImageConfig::default()
        };

        let client = MockClient::authenticated(ME);
        submit(&client, &PostDraft::new("").with_image(&path, "x"), &config)
            .await
            .unwrap();

        assert_eq!(client.uploads()[0].mime_type, "image/jpeg");
        assert!(dir.path().join("big.jpeg").exists());
    }

    #[tokio::test]
    async fn test_missing_image_is_not_found() {
        let client = MockClient::authenticated(ME);
        let draft = PostDraft::new("look").with_image("/definitely/not/here.png", "x");

        let result = submit(&client, &draft, &ImageConfig::default()).await;

        assert!(matches!(result, Err(SkypostError::NotFound(_))));
        assert_eq!(client.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_unauthenticated_client_is_rejected() {
        let client = MockClient::new(ME);

        let result = submit(&client, &PostDraft::new("hi"), &ImageConfig::default()).await;

        assert!(matches!(
            result,
            Err(SkypostError::Platform(PlatformError::NotAuthenticated))
        ));
        assert!(client.created_posts().is_empty());
    }

    #[tokio::test]
    async fn test_post_reports_instead_of_failing() {
        let client = MockClient::authenticated(ME)
            .failing_post(PlatformError::Posting("500 InternalServerError".to_string()));

        assert!(!post(&client, &PostDraft::new("hi"), &ImageConfig::default()).await);
        assert!(!post(&client, &PostDraft::new("y".repeat(400)), &ImageConfig::default()).await);

        let ok = MockClient::authenticated(ME);
        assert!(post(&ok, &PostDraft::new("hi"), &ImageConfig::default()).await);
    }
}
