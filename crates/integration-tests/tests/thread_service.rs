mod common;

use common::{family, text, Forum};
use domains::error::AppError;
use domains::models::Populated;
use tokio_test::assert_err;
use uuid::Uuid;

#[tokio::test]
async fn created_post_fetches_back_with_author_and_no_children() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let body = text();

    let post = forum
        .service
        .create_thread(&body, alice.id, None, "/")
        .await
        .unwrap();
    let node = forum.service.fetch_thread_by_id(post.id).await.unwrap();

    assert_eq!(node.text, body);
    assert_eq!(node.author.resolved().map(|a| a.id), Some(alice.id));
    assert_eq!(node.author.resolved().map(|a| a.name.as_str()), Some(alice.name.as_str()));
    assert!(node.parent_id.is_none());
    assert!(node.community.is_none());
    assert!(node.children.is_empty());
    assert_eq!(forum.reload_user(alice.id).await.threads, vec![post.id]);
}

#[tokio::test]
async fn community_post_is_linked_both_ways() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let community = forum.community("rustaceans").await;

    let post = forum.post(&alice, Some("rustaceans")).await;
    assert_eq!(post.community_id, Some(community.id));

    let node = forum.service.fetch_thread_by_id(post.id).await.unwrap();
    let summary = node
        .community
        .as_ref()
        .and_then(|c| c.resolved())
        .expect("community resolved");
    assert_eq!(summary.slug, "rustaceans");
    assert_eq!(forum.reload_community("rustaceans").await.threads, vec![post.id]);
}

#[tokio::test]
async fn every_added_comment_becomes_a_resolved_child() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let bob = forum.user().await;

    for n in [0usize, 1, 5] {
        let post = forum.post(&alice, None).await;
        for _ in 0..n {
            forum.reply(&post, &bob).await;
        }

        assert_eq!(forum.reload(post.id).await.unwrap().children.len(), n);
        let node = forum.service.fetch_thread_by_id(post.id).await.unwrap();
        assert_eq!(node.children.len(), n);
        for reply in node.replies() {
            assert_eq!(reply.parent_id, Some(post.id));
            assert_eq!(reply.author.resolved().map(|a| a.id), Some(bob.id));
        }
    }
}

#[tokio::test]
async fn fetch_resolves_two_levels_and_leaves_the_third_as_a_reference() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let bob = forum.user().await;

    let root = forum.post(&alice, None).await;
    let first = forum.reply(&root, &bob).await;
    let second = forum.reply(&first, &alice).await;
    let third = forum.reply(&second, &bob).await;

    let node = forum.service.fetch_thread_by_id(root.id).await.unwrap();
    let level1 = node.replies().next().expect("reply resolved");
    assert_eq!(level1.id, first.id);
    assert_eq!(level1.author.resolved().map(|a| a.id), Some(bob.id));

    let level2 = level1.replies().next().expect("reply-to-reply resolved");
    assert_eq!(level2.id, second.id);
    assert_eq!(level2.author.resolved().map(|a| a.id), Some(alice.id));

    assert_eq!(level2.children, vec![Populated::Ref(third.id)]);
}

#[tokio::test]
async fn comments_are_not_recorded_on_the_author() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let bob = forum.user().await;
    let post = forum.post(&alice, None).await;
    forum.reply(&post, &bob).await;

    assert!(forum.reload_user(bob.id).await.threads.is_empty());
}

#[tokio::test]
async fn mutations_revalidate_their_paths() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let post = forum.post(&alice, None).await;
    forum.reply(&post, &alice).await;
    forum.service.delete_thread(post.id, "/profile").await.unwrap();

    assert_eq!(
        forum.revalidator.paths(),
        vec!["/".to_string(), format!("/thread/{}", post.id), "/profile".to_string()]
    );
}

#[tokio::test]
async fn missing_entities_surface_as_not_found() {
    let forum = Forum::memory();
    let alice = forum.user().await;

    let err = assert_err!(forum.service.fetch_thread_by_id(Uuid::now_v7()).await);
    assert!(err.is_not_found());

    let err = assert_err!(
        forum
            .service
            .add_comment_to_thread(Uuid::now_v7(), "orphan", alice.id, "/")
            .await
    );
    assert!(matches!(err, AppError::NotFound(ref kind, _) if kind == "Thread"));

    let err = assert_err!(forum.service.create_thread("hi", Uuid::now_v7(), None, "/").await);
    assert!(matches!(err, AppError::NotFound(ref kind, _) if kind == "User"));
}

#[tokio::test]
async fn user_threads_lists_posts_newest_first_with_replies() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let bob = forum.user().await;
    let older = forum.post(&alice, None).await;
    let newer = forum.post(&alice, None).await;
    forum.reply(&older, &bob).await;

    let profile = forum.service.fetch_user_threads(alice.id).await.unwrap();
    assert_eq!(profile.user.id, alice.id);
    let ids: Vec<Uuid> = profile.threads.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
    assert_eq!(profile.threads[1].replies().count(), 1);
}

#[tokio::test]
async fn activity_lists_replies_from_other_people() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let bob = forum.user().await;
    let carol = forum.user().await;
    let fam = family(&forum, &alice, &bob, None).await;
    let from_carol = forum.reply(&fam.a, &carol).await;

    let activity = forum.service.fetch_activity(alice.id).await.unwrap();
    let ids: Vec<Uuid> = activity.iter().map(|t| t.id).collect();
    // C is alice's own reply and D answers B, not one of alice's posts.
    assert_eq!(ids, vec![from_carol.id, fam.b.id]);
    assert!(activity.iter().all(|t| t.author.is_resolved()));
}

#[tokio::test]
async fn blank_text_is_rejected() {
    let forum = Forum::memory();
    let alice = forum.user().await;
    let post = forum.post(&alice, None).await;

    let err = assert_err!(forum.service.add_comment_to_thread(post.id, "\n\t", alice.id, "/").await);
    assert!(matches!(err, AppError::ValidationError(_)));
    assert!(forum.reload(post.id).await.unwrap().children.is_empty());
}
