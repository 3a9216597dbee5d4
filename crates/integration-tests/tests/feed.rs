mod common;

use chrono::Duration;
use common::{base_time, Forum};
use domains::error::AppError;
use domains::models::Populated;
use tokio_test::assert_err;

/// Seeds posts "post 1" (oldest) to "post {count}" (newest), one second apart.
async fn seeded(count: i64) -> Forum {
    let forum = Forum::memory();
    let author = forum.user().await;
    let base = base_time();
    for i in 1..=count {
        forum
            .post_at(&author, &format!("post {i}"), base + Duration::seconds(i))
            .await;
    }
    forum
}

fn texts(page: &domains::models::FeedPage) -> Vec<String> {
    page.posts.iter().map(|p| p.text.clone()).collect()
}

#[tokio::test]
async fn pages_through_twenty_five_posts() {
    let forum = seeded(25).await;

    // Newest first: position 11 is "post 15", position 20 is "post 6".
    let page2 = forum.service.fetch_posts(2, 10).await.unwrap();
    let expected: Vec<String> = (6..=15).rev().map(|i| format!("post {i}")).collect();
    assert_eq!(texts(&page2), expected);
    assert!(page2.has_next);

    let page3 = forum.service.fetch_posts(3, 10).await.unwrap();
    let expected: Vec<String> = (1..=5).rev().map(|i| format!("post {i}")).collect();
    assert_eq!(texts(&page3), expected);
    assert!(!page3.has_next);

    let page4 = forum.service.fetch_posts(4, 10).await.unwrap();
    assert!(page4.posts.is_empty());
    assert!(!page4.has_next);
}

#[tokio::test]
async fn exact_fit_has_no_next_page() {
    let forum = seeded(10).await;
    let page = forum.service.fetch_posts(1, 10).await.unwrap();
    assert_eq!(page.posts.len(), 10);
    assert!(!page.has_next);
}

#[tokio::test]
async fn feed_excludes_comments_and_resolves_one_reply_level() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let bob = forum.user().await;
    let post = forum.post(&alice, None).await;
    let reply = forum.reply(&post, &bob).await;
    let nested = forum.reply(&reply, &alice).await;

    let page = forum.service.fetch_posts(1, 10).await.unwrap();
    assert_eq!(page.posts.len(), 1);
    let node = &page.posts[0];
    assert_eq!(node.id, post.id);
    assert!(node.author.is_resolved());

    let first = node.replies().next().expect("reply resolved");
    assert_eq!(first.author.resolved().map(|a| a.id), Some(bob.id));
    assert_eq!(first.children, vec![Populated::Ref(nested.id)]);
}

#[tokio::test]
async fn feed_rejects_invalid_windows() {
    let forum = Forum::memory();
    let err = assert_err!(forum.service.fetch_posts(0, 10).await);
    assert!(matches!(err, AppError::ValidationError(_)));
    let err = assert_err!(forum.service.fetch_posts(1, 0).await);
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn feed_posts_carry_their_resolved_community() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let community = forum.community("rustaceans").await;
    let scoped = forum.post(&alice, Some("rustaceans")).await;
    let personal = forum.post(&alice, None).await;

    let page = forum.service.fetch_posts(1, 10).await.unwrap();
    let ids: Vec<_> = page.posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![personal.id, scoped.id]);

    let summary = page.posts[1]
        .community
        .as_ref()
        .and_then(|c| c.resolved())
        .expect("community resolved");
    assert_eq!(summary.id, community.id);
    assert_eq!(summary.slug, "rustaceans");
    assert!(page.posts[0].community.is_none());
}
