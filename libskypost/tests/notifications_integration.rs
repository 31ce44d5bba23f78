//! End-to-end reader tests against the in-memory client

use libskypost::bluesky::mock::{self, MockClient};
use libskypost::bluesky::BlueskyApi;
use libskypost::notifications::{list_notifications, list_posts_and_responses, list_unanswered};
use secrecy::SecretString;

const ME: &str = "me.bsky.social";
const MY_POST: &str = "at://did:plc:me/app.bsky.feed.post/root";
const BOB_REPLY: &str = "at://did:plc:bob/app.bsky.feed.post/reply";

async fn logged_in(client: MockClient) -> MockClient {
    let mut client = client.with_password("app-pass");
    client
        .login(ME, &SecretString::from("app-pass".to_string()))
        .await
        .unwrap();
    client
}

/// The thread lookup for a reply notification targets the reply itself, so
/// an answer posted directly under the original post does not count.
#[tokio::test]
async fn test_unanswered_scan_fetches_the_reply_thread() {
    let my_answer_on_root = mock::post_view(ME, "at://did:plc:me/app.bsky.feed.post/a", "thanks bob");
    let client = logged_in(
        MockClient::new(ME)
            .with_notification(mock::notification(
                "bob.bsky.social",
                "reply",
                BOB_REPLY,
                "cid-reply",
                Some("great post"),
            ))
            .with_thread(
                MY_POST,
                mock::thread(mock::post_view(ME, MY_POST, "root"), vec![my_answer_on_root]),
            )
            .with_thread(
                BOB_REPLY,
                mock::thread(mock::post_view("bob.bsky.social", BOB_REPLY, "great post"), vec![]),
            ),
    )
    .await;

    let unanswered = list_unanswered(&client, 50).await.unwrap();

    assert_eq!(client.thread_requests(), [BOB_REPLY]);
    assert_eq!(unanswered.len(), 1);
    assert_eq!(unanswered[0].author, "bob.bsky.social");
    assert_eq!(unanswered[0].cid, "cid-reply");
    assert_eq!(unanswered[0].uri, BOB_REPLY);
    assert_eq!(unanswered[0].text.as_deref(), Some("great post"));
}

#[tokio::test]
async fn test_mixed_inbox() {
    let answered_uri = "at://did:plc:carol/app.bsky.feed.post/r2";
    let client = logged_in(
        MockClient::new(ME)
            .with_notification(mock::notification("a.bsky.social", "like", MY_POST, "c0", None))
            .with_notification(mock::notification("bob.bsky.social", "reply", BOB_REPLY, "c1", Some("?")))
            .with_notification(mock::notification("carol.bsky.social", "reply", answered_uri, "c2", Some("!")))
            .with_notification(mock::notification("d.bsky.social", "follow", "at://d/follow", "c3", None))
            .with_thread(
                BOB_REPLY,
                mock::thread(mock::post_view("bob.bsky.social", BOB_REPLY, "?"), vec![]),
            )
            .with_thread(
                answered_uri,
                mock::thread(
                    mock::post_view("carol.bsky.social", answered_uri, "!"),
                    vec![mock::post_view(ME, "at://did:plc:me/app.bsky.feed.post/x", "yes")],
                ),
            ),
    )
    .await;

    let all = list_notifications(&client, 50).await.unwrap();
    assert_eq!(all.len(), 4);
    let reasons: Vec<_> = all.iter().map(|n| n.reason.as_str()).collect();
    assert_eq!(reasons, ["like", "reply", "reply", "follow"]);

    let unanswered = list_unanswered(&client, 50).await.unwrap();
    assert_eq!(unanswered.len(), 1);
    assert_eq!(unanswered[0].uri, BOB_REPLY);
}

#[tokio::test]
async fn test_posts_and_responses_for_logged_in_user() {
    let mut root = mock::post_view(ME, MY_POST, "root");
    root.reply_count = Some(1);
    let client = logged_in(
        MockClient::new(ME)
            .with_feed_post(root.clone())
            .with_thread(
                MY_POST,
                mock::thread(root, vec![mock::post_view("bob.bsky.social", BOB_REPLY, "great post")]),
            ),
    )
    .await;

    let posts = list_posts_and_responses(&client).await.unwrap();

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text.as_deref(), Some("root"));
    assert_eq!(posts[0].replies.len(), 1);
    assert_eq!(posts[0].replies[0].author, "bob.bsky.social");
    assert_eq!(client.calls(), ["login", "get_author_feed", "get_post_thread"]);
}
