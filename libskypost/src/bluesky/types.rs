//! Typed wire model for the XRPC calls Skypost makes
//!
//! Responses are decoded into these types once, at the client boundary.
//! Fields the service may omit are `Option` or `#[serde(default)]`; fields
//! Skypost never reads are not modelled and are ignored on decode.

use serde::{Deserialize, Serialize};

use crate::facets::Facet;

pub const POST_COLLECTION: &str = "app.bsky.feed.post";
pub const TAG_FEATURE_TYPE: &str = "app.bsky.richtext.facet#tag";
pub const IMAGES_EMBED_TYPE: &str = "app.bsky.embed.images";

/// The authenticated account, as reported by `createSession`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub did: String,
    pub handle: String,
}

/// Opaque handle for uploaded binary content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRef {
    #[serde(rename = "$type", default = "blob_type")]
    pub blob_type: String,
    #[serde(rename = "ref")]
    pub link: CidLink,
    pub mime_type: String,
    pub size: u64,
}

fn blob_type() -> String {
    "blob".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidLink {
    #[serde(rename = "$link")]
    pub link: String,
}

/// Pointer to a specific post: `com.atproto.repo.strongRef`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub uri: String,
    pub cid: String,
}

/// The `reply` field of a post record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReply {
    pub root: ReplyRef,
    pub parent: ReplyRef,
}

impl PostReply {
    /// Reply chains are flattened to a single level: parent and root are the
    /// same post.
    pub fn flat(reply_to: &ReplyRef) -> Self {
        Self {
            root: reply_to.clone(),
            parent: reply_to.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: String },
}

/// `app.bsky.richtext.facet`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichTextFacet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
}

impl From<&Facet> for RichTextFacet {
    fn from(facet: &Facet) -> Self {
        Self {
            index: ByteSlice {
                byte_start: facet.byte_start,
                byte_end: facet.byte_end,
            },
            features: vec![FacetFeature::Tag {
                tag: facet.tag.clone(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedImage {
    pub alt: String,
    pub image: BlobRef,
}

/// `app.bsky.embed.images`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagesEmbed {
    #[serde(rename = "$type")]
    pub embed_type: String,
    pub images: Vec<EmbedImage>,
}

impl ImagesEmbed {
    pub fn single(image: BlobRef, alt: &str) -> Self {
        Self {
            embed_type: IMAGES_EMBED_TYPE.to_string(),
            images: vec![EmbedImage {
                alt: alt.to_string(),
                image,
            }],
        }
    }
}

/// `app.bsky.feed.post` record as submitted to `createRecord`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub text: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<RichTextFacet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<ImagesEmbed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<PostReply>,
}

impl PostRecord {
    pub fn new(text: &str, created_at: String) -> Self {
        Self {
            record_type: POST_COLLECTION.to_string(),
            text: text.to_string(),
            created_at,
            facets: Vec::new(),
            embed: None,
            reply: None,
        }
    }
}

/// Output of `com.atproto.repo.createRecord`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// The text of an embedded record; non-post records decode with `text: None`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordText {
    #[serde(default)]
    pub text: Option<String>,
}

/// `app.bsky.notification.listNotifications#notification`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    pub reason: String,
    #[serde(default)]
    pub reason_subject: Option<String>,
    #[serde(default)]
    pub record: RecordText,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub indexed_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListNotificationsOutput {
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// `app.bsky.feed.defs#postView`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    #[serde(default)]
    pub record: RecordText,
    #[serde(default)]
    pub reply_count: Option<u64>,
    #[serde(default)]
    pub indexed_at: String,
}

/// A node of a post thread, tagged by `$type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum ThreadNode {
    #[serde(rename = "app.bsky.feed.defs#threadViewPost")]
    Post(ThreadViewPost),
    #[serde(rename = "app.bsky.feed.defs#notFoundPost")]
    NotFound { uri: String },
    #[serde(rename = "app.bsky.feed.defs#blockedPost")]
    Blocked { uri: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadViewPost {
    pub post: PostView,
    #[serde(default)]
    pub replies: Vec<ThreadNode>,
}

impl ThreadNode {
    /// Direct replies that are visible posts; not-found and blocked entries
    /// are skipped.
    pub fn direct_replies(&self) -> impl Iterator<Item = &PostView> {
        let replies: &[ThreadNode] = match self {
            ThreadNode::Post(view) => &view.replies,
            _ => &[],
        };
        replies.iter().filter_map(|node| match node {
            ThreadNode::Post(view) => Some(&view.post),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPostThreadOutput {
    pub thread: ThreadNode,
}

/// `app.bsky.feed.defs#feedViewPost`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedViewPost {
    pub post: PostView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAuthorFeedOutput {
    pub feed: Vec<FeedViewPost>,
    #[serde(default)]
    pub cursor: Option<String>,
}
