//! Integration tests for reviews, comments and title ratings
//!
//! Tests cover:
//! - Rating equals the rounded mean of review scores, null when empty
//! - One review per author per title
//! - Author / moderator / admin write rules, 401 vs 403
//! - Comment routes scoped to their title and review

mod helpers;

use axum::http::StatusCode;
use serde_json::{json, Value};

use helpers::TestApp;

fn reviews_uri(title_id: i64) -> String {
    format!("/api/v1/titles/{}/reviews/", title_id)
}

fn review_uri(title_id: i64, review_id: i64) -> String {
    format!("/api/v1/titles/{}/reviews/{}/", title_id, review_id)
}

fn comments_uri(title_id: i64, review_id: i64) -> String {
    format!("/api/v1/titles/{}/reviews/{}/comments/", title_id, review_id)
}

async fn rating(app: &TestApp, title_id: i64) -> Value {
    let (status, body) = app.get(&format!("/api/v1/titles/{}/", title_id), None).await;
    assert_eq!(status, StatusCode::OK);
    body["rating"].clone()
}

async fn post_review(app: &TestApp, title_id: i64, token: &str, score: i64) -> i64 {
    let (status, body) = app
        .post(
            &reviews_uri(title_id),
            Some(token),
            json!({"text": "Slow and hypnotic", "score": score}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_rating_follows_reviews() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let alice = app.user_token("alice", "user").await;
    let bob = app.user_token("bob", "user").await;
    let title_id = app.seed_title(&admin).await;

    assert!(rating(&app, title_id).await.is_null());

    let first = post_review(&app, title_id, &alice, 7).await;
    assert_eq!(rating(&app, title_id).await, json!(7));

    post_review(&app, title_id, &bob, 8).await;
    assert_eq!(rating(&app, title_id).await, json!(8));

    let (status, _) = app
        .patch(&review_uri(title_id, first), Some(&alice), json!({"score": 2}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rating(&app, title_id).await, json!(5));

    let (status, _) = app.delete(&review_uri(title_id, first), Some(&alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(rating(&app, title_id).await, json!(8));
}

#[tokio::test]
async fn test_rating_after_author_deleted() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let alice = app.user_token("alice", "user").await;
    let title_id = app.seed_title(&admin).await;

    post_review(&app, title_id, &alice, 9).await;
    assert_eq!(rating(&app, title_id).await, json!(9));

    let (status, _) = app.delete("/api/v1/users/alice/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(rating(&app, title_id).await.is_null());
}

#[tokio::test]
async fn test_one_review_per_author() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let alice = app.user_token("alice", "user").await;
    let title_id = app.seed_title(&admin).await;

    post_review(&app, title_id, &alice, 6).await;

    let (status, body) = app
        .post(&reviews_uri(title_id), Some(&alice), json!({"text": "Again", "score": 10}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, list) = app.get(&reviews_uri(title_id), None).await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["results"][0]["author"], "alice");
    assert_eq!(list["results"][0]["score"], 6);
    assert_eq!(rating(&app, title_id).await, json!(6));
}

#[tokio::test]
async fn test_review_write_permissions() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let alice = app.user_token("alice", "user").await;
    let mallory = app.user_token("mallory", "user").await;
    let moderator = app.user_token("moderator", "moderator").await;
    let title_id = app.seed_title(&admin).await;
    let review_id = post_review(&app, title_id, &alice, 7).await;
    let uri = review_uri(title_id, review_id);

    // Anonymous create and edit are unauthenticated
    let (status, _) = app
        .post(&reviews_uri(title_id), None, json!({"text": "Anon", "score": 5}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.patch(&uri, None, json!({"text": "x"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Another plain user is forbidden
    let (status, _) = app.patch(&uri, Some(&mallory), json!({"score": 1})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, Some(&mallory)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(rating(&app, title_id).await, json!(7));

    // Staff may moderate
    let (status, body) = app
        .patch(&uri, Some(&moderator), json!({"text": "Edited by staff"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Edited by staff");
    assert_eq!(body["author"], "alice");

    // Reads are public
    let (status, body) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 7);

    let (status, _) = app.delete(&uri, Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_review_score_bounds() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let alice = app.user_token("alice", "user").await;
    let title_id = app.seed_title(&admin).await;

    for score in [0, 11] {
        let (status, body) = app
            .post(&reviews_uri(title_id), Some(&alice), json!({"text": "x", "score": score}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["fields"]["score"].is_array());
    }
}

#[tokio::test]
async fn test_reviews_of_missing_title() {
    let app = TestApp::new().await;
    let alice = app.user_token("alice", "user").await;

    let (status, _) = app.get(&reviews_uri(999), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(&reviews_uri(999), Some(&alice), json!({"text": "x", "score": 5}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comments_lifecycle() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let alice = app.user_token("alice", "user").await;
    let bob = app.user_token("bob", "user").await;
    let title_id = app.seed_title(&admin).await;
    let review_id = post_review(&app, title_id, &alice, 8).await;

    let (status, comment) = app
        .post(&comments_uri(title_id, review_id), Some(&bob), json!({"text": "Agreed"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["author"], "bob");
    let comment_uri = format!("{}{}/", comments_uri(title_id, review_id), comment["id"]);

    let (status, _) = app.patch(&comment_uri, Some(&alice), json!({"text": "Hijack"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.patch(&comment_uri, Some(&bob), json!({"text": "Fully agreed"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Fully agreed");

    let (_, list) = app.get(&comments_uri(title_id, review_id), None).await;
    assert_eq!(list["count"], 1);

    let (status, _) = app.delete(&comment_uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&comment_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comment_requires_review_of_same_title() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let alice = app.user_token("alice", "user").await;
    let title_id = app.seed_title(&admin).await;

    let (_, other) = app
        .post(
            "/api/v1/titles/",
            Some(&admin),
            json!({"name": "Solaris", "year": 1972, "genre": ["drama"], "category": "films"}),
        )
        .await;
    let other_id = other["id"].as_i64().unwrap();
    let review_id = post_review(&app, title_id, &alice, 8).await;

    let (status, _) = app.get(&comments_uri(other_id, review_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(&comments_uri(other_id, review_id), Some(&alice), json!({"text": "Lost"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_review_removes_comments() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let alice = app.user_token("alice", "user").await;
    let title_id = app.seed_title(&admin).await;
    let review_id = post_review(&app, title_id, &alice, 4).await;

    app.post(&comments_uri(title_id, review_id), Some(&alice), json!({"text": "Note"}))
        .await;
    app.delete(&review_uri(title_id, review_id), Some(&alice)).await;

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
