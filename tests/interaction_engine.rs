use std::sync::Arc;

use shutter::db;
use shutter::db::models::{Interaction, InteractionKind, Post, User};
use shutter::error::AppError;
use shutter::interactions::reconcile::reconcile_post_counters;
use shutter::interactions::{InteractionService, MAX_COMMENT_CHARS};
use shutter::store::{DynEntityStore, InteractionQuery, SqliteEntityStore};
use tempfile::TempDir;

struct Harness {
    service: InteractionService,
    store: DynEntityStore,
    _temp_dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = db::create_pool(&db_path).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");
        let store: DynEntityStore = Arc::new(SqliteEntityStore::new(pool));
        Self {
            service: InteractionService::new(store.clone()),
            store,
            _temp_dir: temp_dir,
        }
    }

    async fn user(&self, name: &str) -> User {
        let user = User::new(name.into(), format!("{}@example.com", name), "hash".into());
        self.store.put_user(&user).await.unwrap();
        user
    }

    async fn post(&self, author: &User) -> Post {
        let post = Post::new(author.user_id.clone(), "posts/p.jpg".into(), None);
        self.store.put_post(&post).await.unwrap();
        post
    }

    async fn counters(&self, post_id: &str) -> (i64, i64) {
        let post = self.store.get_post(post_id).await.unwrap().unwrap();
        (post.likes_count, post.comments_count)
    }
}

#[tokio::test]
async fn toggle_scenario_two_users() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let b = h.user("bob").await;
    let p = h.post(&a).await;

    let r = h.service.toggle_like(&a.user_id, &p.post_id).await.unwrap();
    assert!(r.liked);
    assert_eq!(r.likes_count, 1);

    let r = h.service.toggle_like(&b.user_id, &p.post_id).await.unwrap();
    assert!(r.liked);
    assert_eq!(r.likes_count, 2);

    let r = h.service.toggle_like(&a.user_id, &p.post_id).await.unwrap();
    assert!(!r.liked);
    assert_eq!(r.likes_count, 1);

    assert!(!h
        .service
        .get_user_like_status(&a.user_id, &p.post_id)
        .await
        .unwrap());
    assert!(h
        .service
        .get_user_like_status(&b.user_id, &p.post_id)
        .await
        .unwrap());
}

#[tokio::test]
async fn toggle_alternates_without_net_drift() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let p = h.post(&a).await;

    let mut expected = 0;
    for n in 1..=6 {
        let r = h.service.toggle_like(&a.user_id, &p.post_id).await.unwrap();
        assert_eq!(r.liked, n % 2 == 1, "toggle #{n}");
        expected += if r.liked { 1 } else { -1 };
        assert_eq!(r.likes_count, expected);
    }

    assert_eq!(h.counters(&p.post_id).await.0, 0);
    let likes = h
        .store
        .query_interactions(&p.post_id, &InteractionQuery::of_kind(InteractionKind::Like))
        .await
        .unwrap();
    assert!(likes.is_empty());
}

#[tokio::test]
async fn toggle_on_missing_post_creates_nothing() {
    let h = Harness::new();
    let a = h.user("alice").await;

    let err = h.service.toggle_like(&a.user_id, "missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let records = h
        .store
        .query_interactions("missing", &InteractionQuery::all())
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn like_status_is_scoped_to_user_id_prefix() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let p = h.post(&a).await;

    // A user id that is a strict prefix of another must not match its likes.
    let short = User {
        user_id: "u1".into(),
        ..User::new("u-one".into(), "u1@example.com".into(), "hash".into())
    };
    let long = User {
        user_id: "u10".into(),
        ..User::new("u-ten".into(), "u10@example.com".into(), "hash".into())
    };
    h.store.put_user(&short).await.unwrap();
    h.store.put_user(&long).await.unwrap();

    h.service.toggle_like("u10", &p.post_id).await.unwrap();
    assert!(!h.service.get_user_like_status("u1", &p.post_id).await.unwrap());
    assert!(h.service.get_user_like_status("u10", &p.post_id).await.unwrap());
}

#[tokio::test]
async fn add_comment_trims_and_counts() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let p = h.post(&a).await;

    let r = h
        .service
        .add_comment(&a.user_id, &p.post_id, "  hello world  ")
        .await
        .unwrap();
    assert_eq!(r.comment.content, "hello world");
    assert_eq!(r.comment.username, "alice");
    assert_eq!(r.comments_count, 1);
    assert_eq!(h.counters(&p.post_id).await.1, 1);

    let stored = h
        .store
        .query_interactions(&p.post_id, &InteractionQuery::of_kind(InteractionKind::Comment))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content.as_deref(), Some("hello world"));
}

#[tokio::test]
async fn add_comment_validation_order() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let p = h.post(&a).await;

    // Content is checked before the post exists check.
    let err = h
        .service
        .add_comment(&a.user_id, "missing", "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = h
        .service
        .add_comment(&a.user_id, "missing", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = h
        .service
        .add_comment("ghost", &p.post_id, "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.counters(&p.post_id).await.1, 0);
}

#[tokio::test]
async fn comment_length_boundary() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let p = h.post(&a).await;

    let ok = "x".repeat(MAX_COMMENT_CHARS);
    h.service
        .add_comment(&a.user_id, &p.post_id, &ok)
        .await
        .unwrap();

    let too_long = "x".repeat(MAX_COMMENT_CHARS + 1);
    let err = h
        .service
        .add_comment(&a.user_id, &p.post_id, &too_long)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.counters(&p.post_id).await.1, 1);
}

#[tokio::test]
async fn users_may_comment_repeatedly() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let p = h.post(&a).await;

    for text in ["first", "second", "third"] {
        h.service
            .add_comment(&a.user_id, &p.post_id, text)
            .await
            .unwrap();
    }
    let comments = h.service.get_post_comments(&p.post_id, 50).await.unwrap();
    assert_eq!(comments.comments_count, 3);
    assert_eq!(comments.total_comments, 3);
}

#[tokio::test]
async fn only_author_can_delete_comment() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let b = h.user("bob").await;
    let p = h.post(&a).await;

    let added = h
        .service
        .add_comment(&a.user_id, &p.post_id, "mine")
        .await
        .unwrap();
    let id = added.comment.interaction_id.to_string();

    let err = h
        .service
        .delete_comment(&b.user_id, &p.post_id, &id)
        .await
        .unwrap_err();
    match err {
        AppError::Validation(msg) => assert_eq!(msg, "only own comments can be deleted"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(h.counters(&p.post_id).await.1, 1);
    assert_eq!(
        h.service
            .get_post_comments(&p.post_id, 50)
            .await
            .unwrap()
            .comments_count,
        1
    );

    let r = h
        .service
        .delete_comment(&a.user_id, &p.post_id, &id)
        .await
        .unwrap();
    assert_eq!(r.comments_count, 0);
}

#[tokio::test]
async fn deleting_unknown_comment_leaves_counter() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let p = h.post(&a).await;
    h.service
        .add_comment(&a.user_id, &p.post_id, "keep me")
        .await
        .unwrap();

    let err = h
        .service
        .delete_comment(&a.user_id, &p.post_id, "comment#nobody#2020-01-01T00:00:00.000000Z")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.counters(&p.post_id).await.1, 1);
}

#[tokio::test]
async fn comments_are_returned_oldest_first() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let b = h.user("bob").await;
    let p = h.post(&a).await;

    // Interaction ids sort by user first, so insertion order differs from id order.
    h.service.add_comment(&b.user_id, &p.post_id, "one").await.unwrap();
    h.service.add_comment(&a.user_id, &p.post_id, "two").await.unwrap();
    h.service.add_comment(&b.user_id, &p.post_id, "three").await.unwrap();

    let comments = h.service.get_post_comments(&p.post_id, 50).await.unwrap();
    let contents: Vec<&str> = comments.comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, ["one", "two", "three"]);
    assert!(comments
        .comments
        .windows(2)
        .all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
async fn comment_limit_keeps_oldest_comments() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let b = h.user("bob").await;
    let p = h.post(&a).await;

    // Alice's ids sort before Bob's, but Bob commented first.
    h.service.add_comment(&b.user_id, &p.post_id, "one").await.unwrap();
    h.service.add_comment(&b.user_id, &p.post_id, "two").await.unwrap();
    h.service.add_comment(&a.user_id, &p.post_id, "three").await.unwrap();

    let comments = h.service.get_post_comments(&p.post_id, 2).await.unwrap();
    let contents: Vec<&str> = comments.comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, ["one", "two"]);
    assert_eq!(comments.total_comments, 3);
}

#[tokio::test]
async fn likes_list_and_counter_can_diverge() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let b = h.user("bob").await;
    let p = h.post(&a).await;

    h.service.toggle_like(&a.user_id, &p.post_id).await.unwrap();
    h.service.toggle_like(&b.user_id, &p.post_id).await.unwrap();
    // A like record written without its counter delta.
    h.store
        .put_interaction(&Interaction::like(&p.post_id, &b.user_id))
        .await
        .ok();
    // A liker whose account no longer exists drops out of the join.
    h.store.delete_user(&b.user_id).await.unwrap();

    let likes = h.service.get_post_likes(&p.post_id, 50).await.unwrap();
    assert_eq!(likes.total_likes, 2);
    assert_eq!(likes.likes_count, likes.likes.len());
    assert_eq!(likes.likes_count, 1);
    assert_eq!(likes.likes[0].username, "alice");
}

#[tokio::test]
async fn reads_on_missing_post_are_not_found() {
    let h = Harness::new();
    assert!(matches!(
        h.service.get_post_likes("missing", 50).await.unwrap_err(),
        AppError::NotFound(_)
    ));
    assert!(matches!(
        h.service.get_post_comments("missing", 50).await.unwrap_err(),
        AppError::NotFound(_)
    ));
}

#[tokio::test]
async fn reconciliation_repairs_manual_drift() {
    let h = Harness::new();
    let a = h.user("alice").await;
    let b = h.user("bob").await;
    let p = h.post(&a).await;

    h.service.toggle_like(&a.user_id, &p.post_id).await.unwrap();
    // A like inserted behind the engine's back, as a lost race would leave it.
    h.store
        .put_interaction(&Interaction::like(&p.post_id, &b.user_id))
        .await
        .unwrap();
    assert_eq!(h.counters(&p.post_id).await.0, 1);

    let report = reconcile_post_counters(&h.store, &p.post_id).await.unwrap();
    assert_eq!(report.likes_drift, -1);
    assert_eq!(h.counters(&p.post_id).await.0, 2);
}
